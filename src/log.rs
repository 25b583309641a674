//! Per-run append-only log.
//!
//! Every line carries an RFC 3339 UTC timestamp and a severity. `RunLog` writes the file named after the
//! run start and mirrors each record to stderr; `MemoryLog` keeps records in memory for tests.
use std::cell::RefCell;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::color;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        })
    }
}

/// Append-only sink for run records. Implementations never rewrite earlier lines.
pub trait LogSink {
    fn record(&self, severity: Severity, message: &str);

    /// Captured process output: logged line by line, without a console mirror.
    fn output(&self, label: &str, text: &str);

    fn info(&self, message: &str) {
        self.record(Severity::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(Severity::Warn, message);
    }

    fn error(&self, message: &str) {
        self.record(Severity::Error, message);
    }
}

pub fn timestamp(at: SystemTime) -> String {
    humantime::format_rfc3339_seconds(at).to_string()
}

/// File name for a run started at `at`: `hoist-20261015T093000Z.log`.
pub fn log_file_name(at: SystemTime) -> String {
    let compact: String = timestamp(at).chars().filter(|c| *c != '-' && *c != ':').collect();
    format!("hoist-{compact}.log")
}

fn format_line(severity: Severity, message: &str) -> String {
    format!("[{}] [{}] {}", timestamp(SystemTime::now()), severity, message)
}

pub struct RunLog {
    path: PathBuf,
    file: RefCell<File>,
    console: bool,
}

impl RunLog {
    /// Create the log for a run started at `started` inside `dir`.
    pub fn create(dir: &Path, started: SystemTime) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(started));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: RefCell::new(file),
            console: true,
        })
    }

    /// Disable the stderr mirror (tests, quiet callers).
    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) {
        // A log write failure must not abort a deployment midway.
        if let Err(e) = writeln!(self.file.borrow_mut(), "{line}") {
            tracing::warn!(error = %e, path = %self.path.display(), "failed to append to run log");
        }
    }
}

impl LogSink for RunLog {
    fn record(&self, severity: Severity, message: &str) {
        let line = format_line(severity, message);
        self.append(&line);
        match severity {
            Severity::Info => tracing::info!("{message}"),
            Severity::Warn => tracing::warn!("{message}"),
            Severity::Error => tracing::error!("{message}"),
        }
        if self.console {
            let use_err = color::color_enabled_stderr();
            match severity {
                Severity::Info => eprintln!("{line}"),
                Severity::Warn => color::log_warn_stderr(use_err, &line),
                Severity::Error => color::log_error_stderr(use_err, &line),
            }
        }
    }

    fn output(&self, label: &str, text: &str) {
        for l in text.lines() {
            self.append(&format!(
                "[{}] [{}] {label} | {l}",
                timestamp(SystemTime::now()),
                Severity::Info
            ));
        }
        tracing::debug!(label, bytes = text.len(), "captured process output");
    }
}

/// In-memory sink used by tests and dry inspection.
#[derive(Default)]
pub struct MemoryLog {
    lines: RefCell<Vec<(Severity, String)>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|(_, l)| l.contains(needle))
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.lines
            .borrow()
            .iter()
            .filter(|(s, _)| *s == severity)
            .count()
    }
}

impl LogSink for MemoryLog {
    fn record(&self, severity: Severity, message: &str) {
        self.lines.borrow_mut().push((severity, message.to_string()));
    }

    fn output(&self, label: &str, text: &str) {
        let mut lines = self.lines.borrow_mut();
        for l in text.lines() {
            lines.push((Severity::Info, format!("{label} | {l}")));
        }
    }
}
