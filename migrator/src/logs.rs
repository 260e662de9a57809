//! Leveled run log.
//!
//! Every entry goes to stdout. Once a log file is attached (the CLI does this
//! at start-up) entries are also appended to it with a timestamp, so each run
//! leaves a trace next to its output.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Render without timestamp, as printed on stdout.
    pub fn render(&self) -> String {
        let prefix = match self.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(self.indent as usize);
        format!("{}{} {}", indent, prefix, self.message)
    }
}

/// Global run log
pub static RUN_LOG: Lazy<RunLog> = Lazy::new(RunLog::new);

/// Writes log entries to stdout and to an optional attached file
pub struct RunLog {
    file: Mutex<Option<(PathBuf, File)>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self { file: Mutex::new(None) }
    }

    /// Append every following entry to `path` (created with its parent directory).
    pub fn attach_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if let Ok(mut guard) = self.file.lock() {
            *guard = Some((path.to_path_buf(), file));
        }
        Ok(())
    }

    /// Path of the attached log file, if any.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|(p, _)| p.clone()))
    }

    /// Emit one entry
    pub fn log(&self, entry: LogEntry) {
        let line = entry.render();
        println!("{}", line);

        // A failing log file must never stop the migration
        if let Ok(mut guard) = self.file.lock() {
            if let Some((_, file)) = guard.as_mut() {
                let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(file, "{} {}", stamp, line);
            }
        }
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    RUN_LOG.log(LogEntry::info(msg).with_indent(indent));
}

pub fn log_error_indent(msg: impl Into<String>, indent: u8) {
    RUN_LOG.log(LogEntry::error(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_render_prefix_and_indent() {
        let entry = LogEntry::success("done").with_indent(1);
        assert_eq!(entry.render(), "      ✓ done");
    }

    #[test]
    fn test_attached_file_receives_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");
        let log = RunLog::new();
        log.attach_file(&path).unwrap();
        log.log(LogEntry::error("boom"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("❌ boom"));
        assert_eq!(log.file_path().as_deref(), Some(path.as_path()));
    }
}
