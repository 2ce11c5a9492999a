//! Step runners and the registry that resolves them.
//!
//! The scheduler never runs a step itself. It asks a [`StepDispatcher`] for a
//! [`StepRunner`] and folds the returned status.
//!
//! - [`StepRegistry`] - Explicit step-kind and task-name to constructor map
//! - [`ScriptRunner`] - Inline scripts and script files run by a shell
//! - [`CheckoutRunner`] - Source checkout (the working copy is the source)
//!
//! # Example
//!
//! ```
//! use conveyor::pipeline::Step;
//! use conveyor::steps::{StepDispatcher, StepRegistry};
//!
//! let registry = StepRegistry::with_builtins();
//!
//! assert!(registry.resolve(&Step::script("echo hi")).is_some());
//! assert!(registry.resolve(&Step::task("cmdline@2")).is_some());
//! assert!(registry.resolve(&Step::task("Docker@2")).is_none());
//! ```

pub mod checkout;
pub mod registry;
pub mod script;

pub use checkout::CheckoutRunner;
pub use registry::{RunnerFactory, StepRegistry};
pub use script::{ScriptRunner, ScriptSource};

use crate::error::Result;
use crate::pipeline::{Job, Stage, Step};
use crate::runner::{PipelineRunContext, StatusType};

/// Executes one resolved step.
pub trait StepRunner {
    /// Run the step. Ordinary failures are reported as a status; `Err` is for
    /// conditions the runner could not handle.
    fn run(&mut self, ctx: &mut PipelineRunContext, stage: &Stage, job: &Job)
        -> Result<StatusType>;
}

/// Finds the runner for a step.
pub trait StepDispatcher {
    /// `None` when no runner handles this step.
    fn resolve(&self, step: &Step) -> Option<Box<dyn StepRunner>>;
}
