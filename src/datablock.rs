use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::FxHashMap;
use tempfile::TempPath;

use crate::error::{Error, Result};
use crate::points::ToPoints;
use crate::terminal::{is_open, Terminal};

/// Point data handed to gnuplot.
///
/// Data is either kept in memory and streamed to each terminal as a heredoc
/// (`$DATA1 << EOD ... EOD`), or stored in a temporary file which gnuplot reads
/// by path. File storage makes updates cheap: new points are appended to the file
/// and every holder of the block sees them. The file is removed when the last
/// clone of the block is dropped.
#[derive(Debug)]
pub struct Datablock {
    storage: Storage,
}

#[derive(Debug)]
enum Storage {
    File(Arc<DataFile>),
    Memory {
        data: String,
        // name of this block in each terminal it was streamed to
        names: Mutex<FxHashMap<u64, String>>,
    },
}

#[derive(Debug)]
struct DataFile {
    path: TempPath,
    append: Mutex<()>,
}

impl DataFile {
    fn create(data: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("tmp_data")
            .suffix(".dat")
            .tempfile()?;
        file.write_all(data.as_bytes())?;
        file.flush()?;

        Ok(Self {
            path: file.into_temp_path(),
            append: Mutex::new(()),
        })
    }

    fn append(&self, data: &str) -> Result<()> {
        let _guard = self.append.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        write!(file, "\n{}", data)?;
        Ok(())
    }
}

impl Clone for Datablock {
    /// File-backed blocks are shared, not copied: both handles refer to the same file.
    fn clone(&self) -> Self {
        let storage = match &self.storage {
            Storage::File(file) => Storage::File(Arc::clone(file)),
            Storage::Memory { data, names } => Storage::Memory {
                data: data.clone(),
                names: Mutex::new(
                    names
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone(),
                ),
            },
        };

        Self { storage }
    }
}

impl Datablock {
    pub fn new<P: ToPoints + ?Sized>(data: &P, stored_in_file: bool) -> Result<Self> {
        Self::from_text(data.to_points()?, stored_in_file)
    }

    fn from_text(data: String, stored_in_file: bool) -> Result<Self> {
        let storage = if stored_in_file {
            Storage::File(Arc::new(DataFile::create(&data)?))
        } else {
            Storage::Memory {
                data,
                names: Mutex::new(FxHashMap::default()),
            }
        };

        Ok(Self { storage })
    }

    pub fn is_stored_in_file(&self) -> bool {
        matches!(self.storage, Storage::File(_))
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::File(file) => Some(&*file.path),
            Storage::Memory { .. } => None,
        }
    }

    /// Whether both handles refer to the same stored data.
    pub fn same_block(&self, other: &Datablock) -> bool {
        match (&self.storage, &other.storage) {
            (Storage::File(a), Storage::File(b)) => Arc::ptr_eq(a, b),
            _ => std::ptr::eq(self, other),
        }
    }

    /// Current point text.
    pub fn data(&self) -> Result<String> {
        match &self.storage {
            Storage::File(file) => Ok(std::fs::read_to_string(&file.path)?),
            Storage::Memory { data, .. } => Ok(data.clone()),
        }
    }

    /// Appends points.
    ///
    /// A file-backed block is updated in place and a handle to the same block is
    /// returned. A block kept in memory is left untouched and a new block holding
    /// the old and the new points is returned.
    pub fn update<P: ToPoints + ?Sized>(&self, data: &P) -> Result<Datablock> {
        let text = data.to_points()?;

        match &self.storage {
            Storage::File(file) => {
                file.append(&text)?;
                Ok(self.clone())
            }
            Storage::Memory { data, .. } => Self::from_text(concat(data, &text), false),
        }
    }

    /// Appends points to this block, whatever its storage.
    pub fn update_mut<P: ToPoints + ?Sized>(&mut self, data: &P) -> Result<()> {
        let text = data.to_points()?;

        match &mut self.storage {
            Storage::File(file) => file.append(&text),
            Storage::Memory { data, names } => {
                *data = concat(data, &text);
                // terminals hold the old contents under those names
                names
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear();
                Ok(())
            }
        }
    }

    /// How gnuplot refers to this block.
    ///
    /// The quoted path for a file-backed block. A block kept in memory is streamed
    /// to `terminal` the first time and referred to by its `$DATAn` name from then on,
    /// which fails with [`Error::NoTerminal`] when no terminal is given.
    pub fn name(&self, terminal: Option<&mut Terminal>) -> Result<String> {
        match &self.storage {
            Storage::File(file) => Ok(quote_path(&file.path)),
            Storage::Memory { data, names } => {
                let terminal = terminal.ok_or(Error::NoTerminal)?;
                let mut names = names.lock().unwrap_or_else(PoisonError::into_inner);

                if let Some(name) = names.get(&terminal.id()) {
                    return Ok(name.clone());
                }

                let name = terminal.store_datablock(data)?;
                names.retain(|id, _| is_open(*id));
                names.insert(terminal.id(), name.clone());
                Ok(name)
            }
        }
    }
}

fn concat(old: &str, new: &str) -> String {
    if old.is_empty() {
        new.to_string()
    } else {
        format!("{}\n{}", old, new)
    }
}

pub(crate) fn quote_path(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "''"))
}
