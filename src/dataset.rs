use std::borrow::Cow;
use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::datablock::{quote_path, Datablock};
use crate::error::Result;
use crate::options::{serialize, OptionValue, Options};
use crate::points::ToPoints;
use crate::terminal::Terminal;

// gnuplot rejects clauses where these do not come first, in this order
const OPTION_ORDER: &[&str] = &["index", "using", "axes", "title"];

/// What a dataset plots.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A math function such as `x*sin(x)`.
    Function(String),
    /// An existing data file.
    File(PathBuf),
    Datablock(Datablock),
}

impl DataSource {
    pub fn render(&self, terminal: Option<&mut Terminal>) -> Result<String> {
        match self {
            Self::Function(function) => Ok(function.clone()),
            Self::File(path) => Ok(quote_path(path)),
            Self::Datablock(db) => db.name(terminal),
        }
    }

    pub fn datablock(&self) -> Option<&Datablock> {
        match self {
            Self::Datablock(db) => Some(db),
            _ => None,
        }
    }
}

/// A string names a data file if such a file exists, a math function otherwise.
impl From<&str> for DataSource {
    fn from(s: &str) -> Self {
        if Path::new(s).exists() {
            Self::File(PathBuf::from(s))
        } else {
            Self::Function(s.to_string())
        }
    }
}

impl From<String> for DataSource {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Datablock> for DataSource {
    fn from(db: Datablock) -> Self {
        Self::Datablock(db)
    }
}

/// Shares a file-backed block, copies a block kept in memory.
impl From<&Datablock> for DataSource {
    fn from(db: &Datablock) -> Self {
        Self::Datablock(db.clone())
    }
}

/// One clause of a `plot` command: a data source and its options
/// (`with`, `title`, `using`, `lw`...).
///
/// Datasets are values: [`Dataset::update`] and [`Dataset::with_options`] return new
/// datasets and leave the receiver alone, the `_mut` methods edit in place.
#[derive(Debug, Clone)]
pub struct Dataset {
    source: DataSource,
    options: Options,
}

impl Dataset {
    /// The `file` option is not passed to gnuplot, it only matters for point data
    /// (see [`Dataset::from_points`]).
    pub fn new<S: Into<DataSource>>(source: S, mut options: Options) -> Self {
        if options.remove("file").is_some() {
            tracing::warn!("the 'file' option only applies to point data, ignored");
        }

        Self {
            source: source.into(),
            options,
        }
    }

    pub fn function<S: Into<String>>(function: S, options: Options) -> Self {
        Self {
            source: DataSource::Function(function.into()),
            options,
        }
    }

    pub fn file<P: Into<PathBuf>>(path: P, options: Options) -> Self {
        Self {
            source: DataSource::File(path.into()),
            options,
        }
    }

    /// Wraps point data in a new datablock, stored in a temporary file when
    /// the `file` option is set.
    ///
    /// ```
    /// use rsgnuplot::{options, Dataset};
    ///
    /// let x: Vec<f64> = (0..100).map(|i| i as f64 / 10.0).collect();
    /// let y: Vec<f64> = x.iter().map(|x| x * x).collect();
    ///
    /// let ds = Dataset::from_points(&vec![x, y], options! { with: "points", file: true }).unwrap();
    /// assert!(ds.source().datablock().unwrap().is_stored_in_file());
    /// ```
    pub fn from_points<P: ToPoints + ?Sized>(data: &P, mut options: Options) -> Result<Self> {
        let stored_in_file = options
            .remove("file")
            .map_or(false, |v| v.is_truthy());

        Ok(Self {
            source: DataSource::Datablock(Datablock::new(data, stored_in_file)?),
            options,
        })
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    /// Text of the clause, e.g. `$DATA1 using 1:2 title 'Points' with lines`.
    ///
    /// A terminal is needed when the data lives in a memory datablock.
    pub fn render(&self, terminal: Option<&mut Terminal>) -> Result<String> {
        let source = self.source.render(terminal)?;
        let options = self.options_to_string();

        if options.is_empty() {
            Ok(source)
        } else {
            Ok(format!("{} {}", source, options))
        }
    }

    fn options_to_string(&self) -> String {
        self.options
            .iter()
            .sorted_by_key(|(key, _)| {
                OPTION_ORDER
                    .iter()
                    .position(|k| k == key)
                    .unwrap_or(OPTION_ORDER.len())
            })
            .map(|(key, value)| serialize(Some(key), value))
            .filter(|s| !s.is_empty())
            .join(" ")
    }

    pub fn with_options(&self, options: &Options) -> Self {
        Self {
            source: self.source.clone(),
            options: self.options.merge(options),
        }
    }

    pub fn with_option<K: Into<String>, V: Into<OptionValue>>(&self, key: K, value: V) -> Self {
        self.with_options(&Options::new().with(key, value))
    }

    /// Merges options, or borrows `self` back when there is nothing to merge.
    pub fn update_options(&self, options: &Options) -> Cow<'_, Dataset> {
        if options.is_empty() {
            Cow::Borrowed(self)
        } else {
            Cow::Owned(self.with_options(options))
        }
    }

    /// Appends `data` to the datablock and merges `options`.
    ///
    /// A block kept in memory yields a new dataset. A file-backed block is
    /// appended in place; the receiver itself is handed back unless options
    /// changed too, so `Cow::Borrowed` means "same dataset".
    /// Data given to a function or file dataset is ignored.
    pub fn update<P: ToPoints + ?Sized>(
        &self,
        data: Option<&P>,
        options: &Options,
    ) -> Result<Cow<'_, Dataset>> {
        match (&self.source, data) {
            (DataSource::Datablock(db), Some(data)) => {
                let updated = db.update(data)?;

                if updated.same_block(db) {
                    Ok(self.update_options(options))
                } else {
                    Ok(Cow::Owned(Self {
                        source: DataSource::Datablock(updated),
                        options: self.options.merge(options),
                    }))
                }
            }
            (_, Some(_)) => {
                tracing::warn!("dataset does not hold a datablock, data update ignored");
                Ok(self.update_options(options))
            }
            (_, None) => Ok(self.update_options(options)),
        }
    }

    /// In-place version of [`Dataset::update`].
    pub fn update_mut<P: ToPoints + ?Sized>(
        &mut self,
        data: Option<&P>,
        options: &Options,
    ) -> Result<()> {
        match (&mut self.source, data) {
            (DataSource::Datablock(db), Some(data)) => db.update_mut(data)?,
            (_, Some(_)) => {
                tracing::warn!("dataset does not hold a datablock, data update ignored")
            }
            (_, None) => {}
        }

        self.options.merge_from(options);
        Ok(())
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }
}

impl From<&str> for Dataset {
    fn from(s: &str) -> Self {
        Self::new(s, Options::new())
    }
}

impl From<String> for Dataset {
    fn from(s: String) -> Self {
        Self::new(s, Options::new())
    }
}

impl From<Datablock> for Dataset {
    fn from(db: Datablock) -> Self {
        Self::new(db, Options::new())
    }
}

impl<S: Into<DataSource>> From<(S, Options)> for Dataset {
    fn from((source, options): (S, Options)) -> Self {
        Self::new(source, options)
    }
}
