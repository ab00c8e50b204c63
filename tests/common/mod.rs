#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rsgnuplot::Settings;
use tempfile::TempDir;

/// A stand-in for gnuplot: a shell that writes everything it receives to a log file.
pub struct Recorder {
    pub dir: TempDir,
    pub settings: Arc<Settings>,
}

impl Recorder {
    /// Records silently.
    pub fn new() -> Self {
        Self::with_script(|log| format!("cat > '{}'", log))
    }

    /// Records, and complains on stderr about every line starting with `bad`.
    pub fn complaining() -> Self {
        Self::with_script(|log| {
            format!(
                "while IFS= read -r line; do \
                   printf '%s\\n' \"$line\" >> '{log}'; \
                   case \"$line\" in bad*) printf 'bad command: %s\\n' \"$line\" >&2;; esac; \
                 done",
                log = log
            )
        })
    }

    fn with_script<F: FnOnce(&str) -> String>(script: F) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let script = script(&log.to_string_lossy());

        Self {
            dir,
            settings: Arc::new(Settings::new("sh").with_args(["-c".to_string(), script])),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("log")
    }

    /// Everything written so far; complete once the terminal is closed.
    pub fn log(&self) -> String {
        fs::read_to_string(self.log_path()).unwrap_or_default()
    }
}

/// A stand-in that never reads its input, like a gnuplot stuck in a long fit.
pub fn stalled(timeout: Duration) -> Arc<Settings> {
    Arc::new(
        Settings::new("sh")
            .with_args(["-c", "sleep 10"])
            .with_max_fit_delay(timeout)
            .with_output_timeout(timeout),
    )
}

/// Settings of the installed gnuplot, if there is a usable one.
pub fn gnuplot() -> Option<Arc<Settings>> {
    let settings = Settings::global();
    match settings.version() {
        Ok(_) => Some(settings),
        Err(e) => {
            eprintln!("skipping, no usable gnuplot: {}", e);
            None
        }
    }
}
