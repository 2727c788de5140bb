//! Append-only action log
//!
//! One line per notable event (`[YYYY-mm-dd HH:MM:SS] <action>`), kept next to
//! the tracing output so that executed commands survive log rotation of the
//! service manager. Write failures are reported through tracing and otherwise
//! ignored.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Debug, Clone)]
enum Sink {
    Disabled,
    File(Arc<PathBuf>),
    Memory(Arc<Mutex<Vec<String>>>),
}

/// Cheaply cloneable handle to the action log
#[derive(Debug, Clone)]
pub struct ActionLog {
    sink: Sink,
}

impl ActionLog {
    /// Log appending to `path`, created on first write
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            sink: Sink::File(Arc::new(path.into())),
        }
    }

    /// Log that discards everything
    pub fn disabled() -> Self {
        Self {
            sink: Sink::Disabled,
        }
    }

    /// Log kept in memory, for tests
    pub fn in_memory() -> Self {
        Self {
            sink: Sink::Memory(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::File(path) => Some(path.as_path()),
            _ => None,
        }
    }

    /// Append one timestamped line
    pub fn record(&self, action: &str) {
        let line = format_line(&chrono::Local::now(), action);
        match &self.sink {
            Sink::Disabled => {}
            Sink::File(path) => {
                let result = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path.as_path())
                    .and_then(|mut file| writeln!(file, "{line}"));
                if let Err(e) = result {
                    warn!(path = %path.display(), error = %e, "Failed to append to action log");
                }
            }
            Sink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
        }
    }

    /// Lines recorded so far by an in-memory log
    pub fn entries(&self) -> Vec<String> {
        match &self.sink {
            Sink::Memory(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

fn format_line<Tz>(now: &chrono::DateTime<Tz>, action: &str) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("[{}] {}", now.format("%Y-%m-%d %H:%M:%S"), action)
}
