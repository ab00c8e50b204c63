use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use itertools::Itertools;
use lazy_static::lazy_static;
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::options::{serialize, string_key, OptionValue, Options};
use crate::settings::Settings;

// gnuplot needs term and output before the settings that depend on them
const OPTION_ORDER: &[&str] = &["term", "output", "multiplot", "timefmt", "xrange"];

// stderr lines this short are prompts and blank noise, not errors
const MIN_ERROR_LINE: usize = 4;

static NEXT_TERMINAL_ID: AtomicU64 = AtomicU64::new(1);

lazy_static! {
    static ref OPEN_TERMINALS: Mutex<FxHashSet<u64>> = Mutex::new(FxHashSet::default());
}

fn open_terminals() -> MutexGuard<'static, FxHashSet<u64>> {
    OPEN_TERMINALS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whether the terminal with this id is still running.
pub(crate) fn is_open(id: u64) -> bool {
    open_terminals().contains(&id)
}

fn option_rank(key: &str) -> usize {
    OPTION_ORDER
        .iter()
        .position(|k| *k == key)
        .unwrap_or(OPTION_ORDER.len())
}

/// An open pipe to a gnuplot process.
///
/// All output to gnuplot goes through here: `set`/`unset` of options, heredoc
/// datablocks (named `$DATA1`, `$DATA2`... per process) and raw commands.
/// A background thread collects whatever gnuplot prints to stderr; that output is
/// reported as [`Error::Gnuplot`] on the next write.
pub struct Terminal {
    id: u64,
    settings: Arc<Settings>,
    child: Child,
    stdin: Option<ChildStdin>,
    errors: Receiver<String>,
    reader: Option<JoinHandle<()>>,
    datablocks: usize,
}

impl Terminal {
    /// Starts a new gnuplot process.
    ///
    /// `persist` keeps interactive plot windows open after the process exits.
    pub fn open(settings: &Arc<Settings>, persist: bool) -> Result<Self> {
        let mut cmd = settings.command();
        if persist {
            cmd.arg("-persist");
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take();

        let (sender, errors) = unbounded();

        let reader = match stderr {
            Some(stderr) => Some(
                thread::Builder::new()
                    .name("gnuplot-stderr".to_string())
                    .spawn(move || {
                        for line in BufReader::new(stderr).lines() {
                            let Ok(line) = line else { break };
                            let line = line.trim();
                            if line.len() < MIN_ERROR_LINE {
                                continue;
                            }
                            tracing::debug!("gnuplot stderr: {}", line);
                            if sender.send(line.to_string()).is_err() {
                                break;
                            }
                        }
                    })?,
            ),
            None => None,
        };

        let id = NEXT_TERMINAL_ID.fetch_add(1, Ordering::Relaxed);
        open_terminals().insert(id);

        tracing::info!(
            "started {} (pid {}) as terminal {}",
            settings.gnuplot_path().display(),
            child.id(),
            id
        );

        Ok(Self {
            id,
            settings: Arc::clone(settings),
            child,
            stdin,
            errors,
            reader,
            datablocks: 0,
        })
    }

    /// Process-unique id, used by datablocks to remember under which name they were stored.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn is_closed(&self) -> bool {
        self.stdin.is_none()
    }

    /// Number of heredoc datablocks streamed to this process so far.
    pub fn stored_datablocks(&self) -> usize {
        self.datablocks
    }

    /// Renders options as gnuplot commands, one `set`/`unset` per line.
    ///
    /// ```
    /// use rsgnuplot::{options, Terminal};
    ///
    /// let commands = Terminal::options_to_commands(&options! {
    ///     xrange: 0..=10,
    ///     term: ("qt", options! { size: [100, 100] }),
    ///     key: false,
    /// });
    /// assert_eq!(commands, "set term qt size 100,100\nset xrange [0:10]\nunset key\n");
    /// ```
    pub fn options_to_commands(options: &Options) -> String {
        options
            .iter()
            .sorted_by_key(|(key, _)| option_rank(key))
            .map(|(key, value)| {
                if value.is_truthy() {
                    format!("set {}\n", serialize(Some(key), value))
                } else {
                    format!("unset {}\n", string_key(key))
                }
            })
            .collect()
    }

    /// Sends `set key value` (or `unset key` for `false`) for every option.
    pub fn apply(&mut self, options: &Options) -> Result<&mut Self> {
        if let Some(term) = options.get("term") {
            validate_term(&self.settings, term)?;
        }

        let commands = Self::options_to_commands(options);
        self.write(&commands)?;
        Ok(self)
    }

    /// Sends `unset key` for every given key, in the same order as [`Terminal::apply`].
    pub fn unapply<'a, I>(&mut self, keys: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let commands: String = keys
            .into_iter()
            .sorted_by_key(|key| option_rank(key))
            .map(|key| format!("unset {}\n", string_key(key)))
            .collect();

        self.write(&commands)?;
        Ok(self)
    }

    /// Streams `data` as a heredoc datablock and returns its name.
    ///
    /// ```text
    /// $DATA1 << EOD
    /// 1 1
    /// 2 4
    /// EOD
    /// ```
    pub fn store_datablock(&mut self, data: &str) -> Result<String> {
        let name = format!("$DATA{}", self.datablocks + 1);
        self.write(&format!("{} << EOD\n{}\nEOD\n", name, data))?;
        self.datablocks += 1;
        Ok(name)
    }

    pub fn writeln(&mut self, command: &str) -> Result<&mut Self> {
        self.write(&format!("{}\n", command))
    }

    /// Writes raw text to gnuplot, after reporting errors caused by earlier commands.
    pub fn write(&mut self, text: &str) -> Result<&mut Self> {
        self.check_errors()?;

        let stdin = self.stdin.as_mut().ok_or(Error::TerminalClosed)?;

        tracing::debug!("terminal {} <- {}", self.id, text.trim_end());
        stdin.write_all(text.as_bytes())?;
        stdin.flush()?;

        Ok(self)
    }

    /// Stderr lines gnuplot produced since the last check.
    pub fn drain_output(&mut self) -> Vec<String> {
        self.errors.try_iter().collect()
    }

    /// Fails with [`Error::Gnuplot`] if gnuplot complained about earlier commands.
    ///
    /// The queue is cleared, so the terminal remains usable afterwards.
    pub fn check_errors(&mut self) -> Result<()> {
        let lines = self.drain_output();

        match lines.split_first() {
            None => Ok(()),
            Some((command, rest)) => Err(Error::Gnuplot {
                command: command.clone(),
                details: rest.join("; "),
            }),
        }
    }

    /// Repeats the last plot with the given options set, rereading its data.
    pub fn replot(&mut self, options: &Options) -> Result<&mut Self> {
        self.apply(options)?;
        self.writeln("replot")?;
        self.unapply(options.keys())?;

        if let Some(output) = options.get("output").and_then(OptionValue::as_str) {
            wait_for_output(Path::new(output), self.settings.output_timeout())?;
        }

        Ok(self)
    }

    /// Draws gnuplot's test page for the current terminal type, optionally into a file.
    pub fn test_page(&mut self, output: Option<&Path>) -> Result<&mut Self> {
        if let Some(output) = output {
            let output = output.to_string_lossy();
            self.apply(&Options::new().with("output", &*output))?;
        }

        self.writeln("test")?;

        if output.is_some() {
            self.unapply(["output"])?;
        }

        Ok(self)
    }

    /// Tells gnuplot to exit and waits for it, at most [`Settings::output_timeout`].
    ///
    /// A gnuplot that does not exit in time is killed and [`Error::ExitTimeout`] is
    /// returned. Errors that were still pending are reported after the process is gone.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut stdin) = self.stdin.take() else {
            return Ok(());
        };
        open_terminals().remove(&self.id);

        // a gnuplot that already died leaves a broken pipe behind, waiting still reaps it
        let sent = stdin.write_all(b"\nexit\n").and_then(|_| stdin.flush());
        drop(stdin);

        let timeout = self.settings.output_timeout();
        let start = Instant::now();
        let status = loop {
            if let Some(status) = self.child.try_wait()? {
                break status;
            }
            if start.elapsed() > timeout {
                tracing::warn!("terminal {} did not exit within {:?}", self.id, timeout);
                self.reap()?;
                return Err(Error::ExitTimeout { timeout });
            }
            thread::sleep(Duration::from_millis(10));
        };

        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }

        tracing::info!("terminal {} exited with {}", self.id, status);

        self.check_errors()?;
        sent.map_err(Error::from)
    }

    /// Stops gnuplot without waiting for pending commands.
    pub fn kill(&mut self) -> Result<()> {
        if self.stdin.take().is_none() {
            return Ok(());
        }
        open_terminals().remove(&self.id);

        self.reap()?;
        tracing::info!("terminal {} killed", self.id);
        Ok(())
    }

    fn reap(&mut self) -> Result<()> {
        self.child.kill()?;
        self.child.wait()?;
        // children of the process may still hold stderr open, the reader is left to finish alone
        self.reader.take();
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("terminal {} closed with error: {}", self.id, e);
        }
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("id", &self.id)
            .field("pid", &self.child.id())
            .field("closed", &self.is_closed())
            .field("datablocks", &self.datablocks)
            .finish()
    }
}

/// Checks the terminal name of a `term` option (`"png"` or `("png", {...})`).
///
/// A false `term` only unsets the terminal and is not checked.
pub(crate) fn validate_term(settings: &Settings, term: &OptionValue) -> Result<()> {
    if !term.is_truthy() {
        return Ok(());
    }

    match term.head() {
        Some(name) => settings.validate_terminal(name),
        None => Err(Error::UnsupportedTerminal(term.to_string())),
    }
}

/// Waits until `path` exists with a non-zero size that stopped changing.
pub(crate) fn wait_for_output(path: &Path, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    let mut last_size = 0;

    loop {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if size > 0 && size == last_size {
            return Ok(());
        }
        last_size = size;

        if start.elapsed() > timeout {
            return Err(Error::OutputTimeout {
                path: path.to_path_buf(),
                timeout,
            });
        }

        thread::sleep(Duration::from_millis(10));
    }
}
