use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong while talking to gnuplot.
#[derive(Error, Debug)]
pub enum Error {
    /// The given data cannot be turned into point text.
    #[error("cannot convert data to gnuplot points: {0}")]
    Conversion(String),

    /// The requested terminal type is not reported by the gnuplot executable.
    #[error("gnuplot does not support terminal '{0}', see Settings::available_terminals")]
    UnsupportedTerminal(String),

    /// An in-memory datablock was used without a terminal to stream it to.
    #[error("no terminal given to output an in-memory datablock")]
    NoTerminal,

    /// Output gnuplot wrote to stderr, surfaced on the write following the offending command.
    #[error("error in previous command (\"{command}\"): \"{details}\"")]
    Gnuplot { command: String, details: String },

    #[error("fit did not finish within {delay:?}, gnuplot output: {output}")]
    FitTimeout { delay: Duration, output: String },

    #[error("cannot read fit result: {0}")]
    Fit(String),

    #[error("output file {} was not written within {timeout:?}", path.display())]
    OutputTimeout { path: PathBuf, timeout: Duration },

    #[error("gnuplot version is {found}, please update it to at least {required}")]
    UnsupportedVersion { found: f64, required: f64 },

    #[error("cannot determine gnuplot version from {0:?}")]
    VersionProbe(String),

    /// gnuplot did not exit after `exit` and was killed.
    #[error("gnuplot did not exit within {timeout:?} and was killed")]
    ExitTimeout { timeout: Duration },

    #[error("terminal is closed")]
    TerminalClosed,

    #[error("empty plots are not supported")]
    EmptyPlot,

    #[error("position {index} is out of range for {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gnuplot_error_message() {
        let err = Error::Gnuplot {
            command: "plot foo(x)".to_string(),
            details: "undefined function: foo".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "error in previous command (\"plot foo(x)\"): \"undefined function: foo\""
        );
    }

    #[test]
    fn version_error_message() {
        let err = Error::UnsupportedVersion {
            found: 4.6,
            required: 5.0,
        };

        assert!(err.to_string().contains("4.6"));
    }
}
