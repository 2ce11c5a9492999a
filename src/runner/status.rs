//! Unit status, the combination lattice and continuation gates.

use serde::Serialize;
use std::fmt;

use super::dependency::DependencyNode;

/// Status of a stage, job or step, also used as an aggregate.
///
/// A unit moves `Init → InProgress → {Complete, Warning, Error, Skipped}` and
/// never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum StatusType {
    /// Not started.
    #[default]
    Init,
    /// Currently running.
    InProgress,
    /// Not run.
    Skipped,
    /// Finished with warnings.
    Warning,
    /// Failed.
    Error,
    /// Finished successfully.
    Complete,
}

impl StatusType {
    /// Fold two statuses into one.
    ///
    /// Errors dominate, then warnings. A skipped unit downgrades an otherwise
    /// clean aggregate to [`StatusType::Warning`].
    ///
    /// # Example
    ///
    /// ```
    /// use conveyor::runner::StatusType;
    ///
    /// assert_eq!(StatusType::Error.combine(StatusType::Complete), StatusType::Error);
    /// assert_eq!(StatusType::Skipped.combine(StatusType::Complete), StatusType::Warning);
    /// assert_eq!(StatusType::Complete.combine(StatusType::Complete), StatusType::Complete);
    /// ```
    pub fn combine(self, other: StatusType) -> StatusType {
        use StatusType::*;
        match (self, other) {
            (Error, _) | (_, Error) => Error,
            (Warning, _) | (_, Warning) => Warning,
            (Skipped, _) | (_, Skipped) => Warning,
            _ => Complete,
        }
    }

    /// Whether sequential execution may proceed after a unit ended with this status.
    pub fn can_continue(self) -> bool {
        matches!(
            self,
            StatusType::InProgress | StatusType::Complete | StatusType::Skipped
        )
    }

    /// Like [`can_continue`](Self::can_continue), but errors and warnings are
    /// tolerated for jobs that continue on error.
    pub fn can_continue_for_job<J: DependencyNode + ?Sized>(self, job: &J) -> bool {
        self.can_continue()
            || (job.continue_on_error()
                && matches!(self, StatusType::Error | StatusType::Warning))
    }

    /// Error downgraded to warning when `continue_on_error` is set.
    pub fn downgrade(self, continue_on_error: bool) -> StatusType {
        if continue_on_error && self == StatusType::Error {
            StatusType::Warning
        } else {
            self
        }
    }

    /// Whether this is a final state.
    pub fn is_terminal(self) -> bool {
        !matches!(self, StatusType::Init | StatusType::InProgress)
    }

    /// Whether the status counts as a failure for exit codes.
    pub fn is_failure(self) -> bool {
        self == StatusType::Error
    }
}

impl fmt::Display for StatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StatusType::Init => "Init",
            StatusType::InProgress => "InProgress",
            StatusType::Skipped => "Skipped",
            StatusType::Warning => "Warning",
            StatusType::Error => "Error",
            StatusType::Complete => "Complete",
        };
        f.write_str(text)
    }
}

/// Per-unit status record that refuses to overwrite a terminal status.
#[derive(Debug, Clone, Default)]
pub struct StatusLedger {
    states: Vec<StatusType>,
}

impl StatusLedger {
    /// Ledger for `len` units, all in [`StatusType::Init`].
    pub fn new(len: usize) -> Self {
        Self {
            states: vec![StatusType::Init; len],
        }
    }

    /// Current status of a unit.
    pub fn get(&self, index: usize) -> StatusType {
        self.states.get(index).copied().unwrap_or_default()
    }

    /// Move a unit from `Init` to `InProgress`.
    pub fn start(&mut self, index: usize) -> bool {
        match self.states.get_mut(index) {
            Some(state) if *state == StatusType::Init => {
                *state = StatusType::InProgress;
                true
            }
            _ => false,
        }
    }

    /// Record a terminal status. Returns `false` when the unit already had one.
    pub fn record(&mut self, index: usize, status: StatusType) -> bool {
        match self.states.get_mut(index) {
            Some(state) if !state.is_terminal() => {
                *state = status;
                true
            }
            _ => false,
        }
    }

    /// All statuses in unit order.
    pub fn statuses(&self) -> &[StatusType] {
        &self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StatusType::*;

    struct Flag(bool);

    impl DependencyNode for Flag {
        fn name(&self) -> Option<&str> {
            None
        }
        fn depends_on(&self) -> &[String] {
            &[]
        }
        fn continue_on_error(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn lattice_cases() {
        assert_eq!(Error.combine(Complete), Error);
        assert_eq!(Warning.combine(Complete), Warning);
        assert_eq!(Skipped.combine(Complete), Warning);
        assert_eq!(Complete.combine(Complete), Complete);
    }

    #[test]
    fn combine_is_symmetric() {
        let all = [Init, InProgress, Skipped, Warning, Error, Complete];
        for a in all {
            for b in all {
                assert_eq!(a.combine(b), b.combine(a), "{a} / {b}");
            }
        }
    }

    #[test]
    fn error_dominates_warning_and_skip() {
        assert_eq!(Warning.combine(Error), Error);
        assert_eq!(Skipped.combine(Error), Error);
        assert_eq!(Skipped.combine(Warning), Warning);
        assert_eq!(Init.combine(Complete), Complete);
    }

    #[test]
    fn sequential_gate() {
        assert!(InProgress.can_continue());
        assert!(Complete.can_continue());
        assert!(Skipped.can_continue());
        assert!(!Warning.can_continue());
        assert!(!Error.can_continue());
        assert!(!Init.can_continue());
    }

    #[test]
    fn job_gate_respects_continue_on_error() {
        assert!(!Error.can_continue_for_job(&Flag(false)));
        assert!(!Warning.can_continue_for_job(&Flag(false)));
        assert!(Error.can_continue_for_job(&Flag(true)));
        assert!(Warning.can_continue_for_job(&Flag(true)));
        assert!(Complete.can_continue_for_job(&Flag(false)));
    }

    #[test]
    fn downgrade_only_touches_errors() {
        assert_eq!(Error.downgrade(true), Warning);
        assert_eq!(Error.downgrade(false), Error);
        assert_eq!(Skipped.downgrade(true), Skipped);
    }

    #[test]
    fn ledger_keeps_first_terminal_status() {
        let mut ledger = StatusLedger::new(2);
        assert_eq!(ledger.get(0), Init);

        assert!(ledger.start(0));
        assert!(!ledger.start(0));
        assert_eq!(ledger.get(0), InProgress);

        assert!(ledger.record(0, Error));
        assert!(!ledger.record(0, Complete));
        assert_eq!(ledger.get(0), Error);

        assert!(ledger.record(1, Skipped));
        assert_eq!(ledger.statuses(), &[Error, Skipped]);
        assert!(!ledger.record(5, Complete));
    }
}
