use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

/// Oldest gnuplot that knows about datablocks and the other features used here.
pub const MIN_GNUPLOT_VERSION: f64 = 5.0;

lazy_static! {
    static ref VERSION: Regex = Regex::new(r"gnuplot ([^ ]+)").unwrap();
    static ref TERMINAL: Regex = Regex::new(r"[:\n] +([a-z][^ ]+)").unwrap();
    static ref DEFAULT: Arc<Settings> = Arc::new(Settings::from_env());
}

#[derive(Debug, Clone)]
struct Probe {
    version: f64,
    terminals: Vec<String>,
}

/// How to run gnuplot, and how long to wait for it.
///
/// Version and available terminal types are probed on first use and cached per `Settings`.
#[derive(Debug)]
pub struct Settings {
    gnuplot_path: PathBuf,
    gnuplot_args: Vec<OsString>,
    max_fit_delay: Duration,
    output_timeout: Duration,
    probe: OnceLock<Probe>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new("gnuplot")
    }
}

impl Settings {
    pub fn new<P: Into<PathBuf>>(gnuplot_path: P) -> Self {
        Self {
            gnuplot_path: gnuplot_path.into(),
            gnuplot_args: Vec::new(),
            max_fit_delay: Duration::from_secs(5),
            output_timeout: Duration::from_secs(30),
            probe: OnceLock::new(),
        }
    }

    /// Reads `GNUPLOT_PATH` and `RSGNUPLOT_MAX_FIT_DELAY` (seconds), falling back to defaults.
    pub fn from_env() -> Self {
        let mut settings = match std::env::var_os("GNUPLOT_PATH") {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::default(),
        };

        if let Some(delay) = std::env::var("RSGNUPLOT_MAX_FIT_DELAY")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
        {
            settings.max_fit_delay = Duration::from_secs_f64(delay);
        }

        settings
    }

    /// The process-wide default, built once from the environment.
    pub fn global() -> Arc<Settings> {
        Arc::clone(&DEFAULT)
    }

    /// Extra arguments passed to the executable before `-persist`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.gnuplot_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_fit_delay(mut self, delay: Duration) -> Self {
        self.max_fit_delay = delay;
        self
    }

    pub fn with_output_timeout(mut self, timeout: Duration) -> Self {
        self.output_timeout = timeout;
        self
    }

    pub fn gnuplot_path(&self) -> &Path {
        &self.gnuplot_path
    }

    pub fn gnuplot_args(&self) -> &[OsString] {
        &self.gnuplot_args
    }

    pub fn max_fit_delay(&self) -> Duration {
        self.max_fit_delay
    }

    pub fn output_timeout(&self) -> Duration {
        self.output_timeout
    }

    pub fn version(&self) -> Result<f64> {
        Ok(self.probe()?.version)
    }

    /// Terminal types (png, svg, qt, dumb...) this gnuplot reports.
    pub fn available_terminals(&self) -> Result<&[String]> {
        Ok(&self.probe()?.terminals)
    }

    pub fn is_terminal_available(&self, terminal: &str) -> Result<bool> {
        Ok(self.available_terminals()?.iter().any(|t| t == terminal))
    }

    pub fn validate_terminal(&self, terminal: &str) -> Result<()> {
        if self.is_terminal_available(terminal)? {
            Ok(())
        } else {
            Err(Error::UnsupportedTerminal(terminal.to_string()))
        }
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.gnuplot_path);
        cmd.args(&self.gnuplot_args);
        cmd
    }

    fn probe(&self) -> Result<&Probe> {
        if let Some(probe) = self.probe.get() {
            return Ok(probe);
        }

        let version = self.probe_version()?;
        let terminals = self.probe_terminals()?;

        tracing::debug!(
            "probed {}: version {}, {} terminals",
            self.gnuplot_path.display(),
            version,
            terminals.len()
        );

        // a concurrent probe may have won the race, both results are equal
        let _ = self.probe.set(Probe { version, terminals });
        self.probe.get().ok_or_else(|| Error::VersionProbe(String::new()))
    }

    fn probe_version(&self) -> Result<f64> {
        let output = self.command().arg("--version").output()?;
        let text = String::from_utf8_lossy(&output.stdout);
        let version = parse_version(&text)?;

        if version < MIN_GNUPLOT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                required: MIN_GNUPLOT_VERSION,
            });
        }

        Ok(version)
    }

    fn probe_terminals(&self) -> Result<Vec<String>> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(b"set term\n")?;
        }

        let output = child.wait_with_output()?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(parse_terminals(&text))
    }
}

/// Reads the version number out of `gnuplot --version` output, e.g. `gnuplot 5.4 patchlevel 2`.
pub fn parse_version(text: &str) -> Result<f64> {
    VERSION
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .ok_or_else(|| Error::VersionProbe(text.trim().to_string()))
}

/// Collects terminal names out of the `set term` listing.
pub fn parse_terminals(text: &str) -> Vec<String> {
    TERMINAL
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
