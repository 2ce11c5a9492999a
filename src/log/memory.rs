//! In-memory [`RunLog`] for tests.
//!
//! `MemoryLog` is cheap to clone and every clone shares the same entries, so a
//! test can hand one clone to the run context and inspect the other afterwards.
//!
//! # Example
//!
//! ```
//! use conveyor::log::{LogLevel, MemoryLog, RunLog};
//!
//! let log = MemoryLog::new();
//! let mut handle = log.clone();
//! handle.warn("No runner for step");
//!
//! assert_eq!(log.messages(LogLevel::Warn), vec!["No runner for step".to_string()]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use super::{RunLog, UnitKind};
use crate::runner::StatusType;

/// Severity of a recorded entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Output,
}

/// A recorded log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// A message or output line.
    Message { level: LogLevel, text: String },
    /// A unit started.
    Start {
        unit: UnitKind,
        index: usize,
        total: usize,
        name: String,
    },
    /// A unit finished.
    Finish {
        unit: UnitKind,
        name: String,
        status: StatusType,
    },
}

/// Records every log call for later assertion.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        // A panicking test thread must not hide the entries from the others.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, entry: LogEntry) {
        self.lock().push(entry);
    }

    /// All entries in order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Text of every message at `level`.
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                LogEntry::Message { level: l, text } if *l == level => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded terminal status for a unit, if it finished.
    pub fn status_of(&self, unit: UnitKind, name: &str) -> Option<StatusType> {
        self.lock().iter().rev().find_map(|e| match e {
            LogEntry::Finish {
                unit: u,
                name: n,
                status,
            } if *u == unit && n == name => Some(*status),
            _ => None,
        })
    }

    /// Names of units of a kind that started, in order.
    pub fn started(&self, unit: UnitKind) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                LogEntry::Start { unit: u, name, .. } if *u == unit => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether any entry mentions `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|e| match e {
            LogEntry::Message { text, .. } => text.contains(needle),
            LogEntry::Start { name, .. } | LogEntry::Finish { name, .. } => name.contains(needle),
        })
    }
}

impl RunLog for MemoryLog {
    fn info(&mut self, msg: &str) {
        self.push(LogEntry::Message {
            level: LogLevel::Info,
            text: msg.to_string(),
        });
    }

    fn warn(&mut self, msg: &str) {
        self.push(LogEntry::Message {
            level: LogLevel::Warn,
            text: msg.to_string(),
        });
    }

    fn error(&mut self, msg: &str) {
        self.push(LogEntry::Message {
            level: LogLevel::Error,
            text: msg.to_string(),
        });
    }

    fn output(&mut self, line: &str) {
        self.push(LogEntry::Message {
            level: LogLevel::Output,
            text: line.to_string(),
        });
    }

    fn start(&mut self, unit: UnitKind, index: usize, total: usize, name: &str) {
        self.push(LogEntry::Start {
            unit,
            index,
            total,
            name: name.to_string(),
        });
    }

    fn finish(&mut self, unit: UnitKind, name: &str, status: StatusType) {
        self.push(LogEntry::Finish {
            unit,
            name: name.to_string(),
            status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let log = MemoryLog::new();
        let mut writer = log.clone();

        writer.info("hello");
        writer.output("line 1");
        writer.error("boom");

        assert_eq!(log.entries().len(), 3);
        assert_eq!(log.messages(LogLevel::Output), vec!["line 1".to_string()]);
        assert!(log.contains("boom"));
        assert!(!log.contains("absent"));
    }

    #[test]
    fn tracks_unit_lifecycle() {
        let log = MemoryLog::new();
        let mut writer = log.clone();

        writer.start(UnitKind::Job, 0, 2, "build");
        writer.start(UnitKind::Job, 1, 2, "test");
        writer.finish(UnitKind::Job, "build", StatusType::Complete);

        assert_eq!(log.started(UnitKind::Job), vec!["build", "test"]);
        assert_eq!(
            log.status_of(UnitKind::Job, "build"),
            Some(StatusType::Complete)
        );
        assert_eq!(log.status_of(UnitKind::Job, "test"), None);
        assert_eq!(log.status_of(UnitKind::Stage, "build"), None);
    }
}
