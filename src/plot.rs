use std::borrow::Cow;
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::options::{OptionValue, Options};
use crate::points::ToPoints;
use crate::settings::Settings;
use crate::terminal::{validate_term, wait_for_output, Terminal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Output formats a plot can be exported to, by gnuplot terminal name.
pub enum Format {
    Png,
    PngCairo,
    Jpeg,
    Gif,
    Svg,
    PdfCairo,
    EpsCairo,
    Canvas,
    /// ascii art, the output is plain text
    Dumb,
}

impl Format {
    const fn variants<'a>() -> &'a [Self] {
        &[
            Self::Png,
            Self::PngCairo,
            Self::Jpeg,
            Self::Gif,
            Self::Svg,
            Self::PdfCairo,
            Self::EpsCairo,
            Self::Canvas,
            Self::Dumb,
        ]
    }

    /// Name of the gnuplot terminal that writes this format.
    pub fn terminal(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::PngCairo => "pngcairo",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Svg => "svg",
            Self::PdfCairo => "pdfcairo",
            Self::EpsCairo => "epscairo",
            Self::Canvas => "canvas",
            Self::Dumb => "dumb",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png | Self::PngCairo => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Svg => "svg",
            Self::PdfCairo => "pdf",
            Self::EpsCairo => "eps",
            Self::Canvas => "html",
            Self::Dumb => "txt",
        }
    }

    /// Format for a file extension, the plain (non-cairo) one where both exist.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        Self::variants()
            .iter()
            .find(|variant| variant.extension() == extension || (extension == "jpeg" && **variant == Self::Jpeg))
            .copied()
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.terminal())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::variants()
            .iter()
            .find(|variant| variant.terminal() == s || (s == "jpg" && **variant == Self::Jpeg))
            .copied()
            .ok_or_else(|| Error::UnsupportedTerminal(s.to_string()))
    }
}

/// Something that can be drawn by gnuplot: a [`Plot`], a
/// [`Multiplot`](crate::multiplot::Multiplot), a [`Dataset`].
pub trait Plottable {
    /// Draws with the given options on top of the object's own.
    ///
    /// With an `output` option the drawing happens in a fresh gnuplot process and
    /// returns once the output file is complete.
    fn plot(&mut self, options: &Options) -> Result<()>;

    /// Draws into `path`, or into a temporary file whose contents are returned.
    fn export(
        &mut self,
        format: Format,
        path: Option<&Path>,
        terminal_options: &Options,
    ) -> Result<Option<Vec<u8>>> {
        let term = OptionValue::Seq(vec![
            format.terminal().into(),
            terminal_options.clone().into(),
        ]);

        match path {
            Some(path) => {
                let options = Options::new()
                    .with("term", term)
                    .with("output", path.to_string_lossy().into_owned());
                self.plot(&options)?;
                Ok(None)
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix(format.terminal())
                    .suffix(&format!(".{}", format.extension()))
                    .tempfile()?
                    .into_temp_path();

                let options = Options::new()
                    .with("term", term)
                    .with("output", temp.to_string_lossy().into_owned());
                self.plot(&options)?;

                let contents = std::fs::read(&temp)?;
                temp.close()?;
                Ok(Some(contents))
            }
        }
    }

    fn export_to(&mut self, format: Format, path: &Path, terminal_options: &Options) -> Result<()> {
        self.export(format, Some(path), terminal_options).map(|_| ())
    }

    fn export_bytes(&mut self, format: Format, terminal_options: &Options) -> Result<Vec<u8>> {
        self.export(format, None, terminal_options)
            .map(Option::unwrap_or_default)
    }
}

/// `output` option of a merged option set, as a path.
pub(crate) fn output_path(options: &Options) -> Option<PathBuf> {
    options
        .get("output")
        .and_then(OptionValue::as_str)
        .map(PathBuf::from)
}

/// Runs `render` on a suitable terminal.
///
/// Without output the object's own terminal is used (opened on first use). With an
/// output file a fresh gnuplot is started and closed afterwards: gnuplot finishes
/// writing a file only when the output changes or the process exits. A gnuplot
/// still busy after [`Settings::output_timeout`] is killed.
pub(crate) fn draw<F>(
    settings: &Arc<Settings>,
    own: &mut Option<Terminal>,
    output: Option<&Path>,
    render: F,
) -> Result<()>
where
    F: FnOnce(&mut Terminal) -> Result<()>,
{
    if let Some(output) = output {
        let mut terminal = Terminal::open(settings, false)?;
        render(&mut terminal)?;
        return match terminal.close() {
            Ok(()) => wait_for_output(output, settings.output_timeout()),
            Err(Error::ExitTimeout { timeout }) => Err(Error::OutputTimeout {
                path: output.to_path_buf(),
                timeout,
            }),
            Err(e) => Err(e),
        };
    }

    if own.as_ref().map_or(true, Terminal::is_closed) {
        *own = Some(Terminal::open(settings, false)?);
    }

    match own.as_mut() {
        Some(terminal) => render(terminal),
        None => Err(Error::TerminalClosed),
    }
}

pub(crate) fn check_position(position: usize, len: usize) -> Result<()> {
    if position < len {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange {
            index: position,
            len,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    /// 2D, `plot`
    Plot,
    /// 3D, `splot`
    Splot,
}

impl PlotKind {
    pub fn command(self) -> &'static str {
        match self {
            Self::Plot => "plot",
            Self::Splot => "splot",
        }
    }
}

/// A set of datasets drawn by one `plot` (or `splot`) command, with plot-wide
/// options such as `title`, `xrange` or `term`.
///
/// Edits return new plots; the `_mut` variants change the receiver. Each plot opens
/// its own gnuplot on first use, clones start without one.
#[derive(Debug)]
pub struct Plot {
    datasets: Vec<Dataset>,
    options: Options,
    kind: PlotKind,
    settings: Arc<Settings>,
    terminal: Option<Terminal>,
}

impl Clone for Plot {
    fn clone(&self) -> Self {
        self.derive(self.datasets.clone(), self.options.clone())
    }
}

impl Plot {
    pub fn new<I, D>(datasets: I, options: Options) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<Dataset>,
    {
        Self::with_settings(&Settings::global(), PlotKind::Plot, datasets, options)
    }

    pub fn splot<I, D>(datasets: I, options: Options) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<Dataset>,
    {
        Self::with_settings(&Settings::global(), PlotKind::Splot, datasets, options)
    }

    /// Fails with [`Error::UnsupportedTerminal`] when `term` names a terminal gnuplot lacks.
    pub fn with_settings<I, D>(
        settings: &Arc<Settings>,
        kind: PlotKind,
        datasets: I,
        options: Options,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<Dataset>,
    {
        if let Some(term) = options.get("term") {
            validate_term(settings, term)?;
        }

        Ok(Self {
            datasets: datasets.into_iter().map(Into::into).collect(),
            options,
            kind,
            settings: Arc::clone(settings),
            terminal: None,
        })
    }

    fn derive(&self, datasets: Vec<Dataset>, options: Options) -> Self {
        Self {
            datasets,
            options,
            kind: self.kind,
            settings: Arc::clone(&self.settings),
            terminal: None,
        }
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn dataset(&self, position: usize) -> Option<&Dataset> {
        self.datasets.get(position)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn kind(&self) -> PlotKind {
        self.kind
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// The gnuplot process this plot draws on by default, started on first use.
    pub fn own_terminal(&mut self) -> Result<&mut Terminal> {
        if self.terminal.as_ref().map_or(true, Terminal::is_closed) {
            self.terminal = Some(Terminal::open(&self.settings, false)?);
        }
        self.terminal.as_mut().ok_or(Error::TerminalClosed)
    }

    fn merged_options(&self, options: &Options, multiplot_part: bool) -> Options {
        let merged = self.options.merge(options);
        if multiplot_part {
            // term and output belong to the multiplot
            merged.without(&["term", "output"])
        } else {
            merged
        }
    }

    /// The full `plot`/`splot` command, streaming datablocks to `terminal` as needed.
    pub fn command(&self, terminal: &mut Terminal) -> Result<String> {
        if self.datasets.is_empty() {
            return Err(Error::EmptyPlot);
        }

        let clauses = self
            .datasets
            .iter()
            .map(|ds| ds.render(Some(&mut *terminal)))
            .collect::<Result<Vec<_>>>()?;

        Ok(format!("{} {}", self.kind.command(), clauses.join(" , ")))
    }

    /// Draws on `terminal` with `options` layered over the plot's own.
    ///
    /// Options are set before the plot command and unset after it, so they do not
    /// leak into whatever is drawn next on the same terminal.
    pub fn render_to(
        &self,
        terminal: &mut Terminal,
        multiplot_part: bool,
        options: &Options,
    ) -> Result<()> {
        let options = self.merged_options(options, multiplot_part);
        let command = self.command(terminal)?;

        terminal.apply(&options)?;
        terminal.writeln(&command)?;
        terminal.unapply(options.keys())?;

        Ok(())
    }

    /// Draws on a terminal the caller owns and keeps open.
    ///
    /// With an `output` option this waits until the file has been written.
    pub fn plot_on(&self, terminal: &mut Terminal, options: &Options) -> Result<()> {
        self.render_to(terminal, false, options)?;

        if let Some(output) = output_path(&self.merged_options(options, false)) {
            wait_for_output(&output, self.settings.output_timeout())?;
        }

        Ok(())
    }

    pub fn with_options(&self, options: &Options) -> Self {
        self.derive(self.datasets.clone(), self.options.merge(options))
    }

    pub fn with_option<K: Into<String>, V: Into<OptionValue>>(&self, key: K, value: V) -> Self {
        self.with_options(&Options::new().with(key, value))
    }

    pub fn replace_dataset<D: Into<Dataset>>(&self, position: usize, dataset: D) -> Result<Self> {
        let mut plot = self.clone();
        plot.replace_dataset_mut(position, dataset)?;
        Ok(plot)
    }

    pub fn replace_dataset_mut<D: Into<Dataset>>(
        &mut self,
        position: usize,
        dataset: D,
    ) -> Result<()> {
        check_position(position, self.datasets.len())?;
        self.datasets[position] = dataset.into();
        Ok(())
    }

    /// Inserts datasets before `position` (`position == len` appends).
    pub fn insert_datasets<I, D>(&self, position: usize, datasets: I) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<Dataset>,
    {
        let mut plot = self.clone();
        plot.insert_datasets_mut(position, datasets)?;
        Ok(plot)
    }

    pub fn insert_datasets_mut<I, D>(&mut self, position: usize, datasets: I) -> Result<()>
    where
        I: IntoIterator<Item = D>,
        D: Into<Dataset>,
    {
        check_position(position, self.datasets.len() + 1)?;
        self.datasets
            .splice(position..position, datasets.into_iter().map(Into::into));
        Ok(())
    }

    pub fn add_dataset<D: Into<Dataset>>(&self, dataset: D) -> Self {
        let mut plot = self.clone();
        plot.datasets.push(dataset.into());
        plot
    }

    /// Removes the dataset at `position`, or the last one.
    pub fn remove_dataset(&self, position: Option<usize>) -> Result<Self> {
        let mut plot = self.clone();
        plot.remove_dataset_mut(position)?;
        Ok(plot)
    }

    pub fn remove_dataset_mut(&mut self, position: Option<usize>) -> Result<Dataset> {
        let len = self.datasets.len();
        let position = match position {
            Some(position) => position,
            None => len.checked_sub(1).ok_or(Error::IndexOutOfRange { index: 0, len })?,
        };

        check_position(position, len)?;
        Ok(self.datasets.remove(position))
    }

    /// Updates the dataset at `position` (see [`Dataset::update`]).
    ///
    /// Borrows `self` back when the dataset did not change.
    pub fn update_dataset<P: ToPoints + ?Sized>(
        &self,
        position: usize,
        data: Option<&P>,
        options: &Options,
    ) -> Result<Cow<'_, Plot>> {
        check_position(position, self.datasets.len())?;

        match self.datasets[position].update(data, options)? {
            Cow::Borrowed(_) => Ok(Cow::Borrowed(self)),
            Cow::Owned(dataset) => Ok(Cow::Owned(self.replace_dataset(position, dataset)?)),
        }
    }

    pub fn update_dataset_mut<P: ToPoints + ?Sized>(
        &mut self,
        position: usize,
        data: Option<&P>,
        options: &Options,
    ) -> Result<()> {
        check_position(position, self.datasets.len())?;
        self.datasets[position].update_mut(data, options)
    }
}

impl Plottable for Plot {
    fn plot(&mut self, options: &Options) -> Result<()> {
        let output = output_path(&self.merged_options(options, false));

        let mut own = self.terminal.take();
        let result = draw(&self.settings, &mut own, output.as_deref(), |terminal| {
            self.render_to(terminal, false, options)
        });
        self.terminal = own;

        result
    }
}

impl Plottable for Dataset {
    /// Draws this dataset alone, on a plot that lives for this call only.
    fn plot(&mut self, options: &Options) -> Result<()> {
        Plot::new([self.clone()], Options::new())?.plot(options)
    }
}
