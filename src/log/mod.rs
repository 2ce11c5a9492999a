//! Run progress logging.
//!
//! The scheduler reports progress through the [`RunLog`] trait, which is
//! injected into the run context rather than reached through global state.
//! Everything handed to a `RunLog` has already been passed through secret
//! masking.
//!
//! - [`ConsoleLog`] writes styled lines to the terminal
//! - [`MemoryLog`] records entries for assertions in tests
//!
//! # Example
//!
//! ```
//! use conveyor::log::{MemoryLog, RunLog, UnitKind};
//! use conveyor::runner::StatusType;
//!
//! let mut log = MemoryLog::new();
//! log.start(UnitKind::Step, 0, 2, "compile");
//! log.finish(UnitKind::Step, "compile", StatusType::Complete);
//!
//! assert!(log.contains("compile"));
//! ```

pub mod console;
pub mod memory;
pub mod theme;

pub use console::ConsoleLog;
pub use memory::{LogEntry, LogLevel, MemoryLog};
pub use theme::{format_duration, should_use_colors, LogTheme};

use crate::runner::StatusType;
use std::fmt;

/// The kind of unit a progress event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Stage,
    Job,
    Step,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Stage => f.write_str("Stage"),
            UnitKind::Job => f.write_str("Job"),
            UnitKind::Step => f.write_str("Step"),
        }
    }
}

/// Receiver for human-readable run progress.
///
/// The format is owned by the implementation.
pub trait RunLog: Send {
    /// Informational message.
    fn info(&mut self, msg: &str);

    /// Warning message.
    fn warn(&mut self, msg: &str);

    /// Error message.
    fn error(&mut self, msg: &str);

    /// A line of output produced by a step.
    fn output(&mut self, line: &str);

    /// A unit is starting; `index` is zero-based within `total` siblings.
    fn start(&mut self, unit: UnitKind, index: usize, total: usize, name: &str);

    /// A unit reached a terminal status.
    fn finish(&mut self, unit: UnitKind, name: &str, status: StatusType);
}
