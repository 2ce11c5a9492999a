//! Pipeline execution: statuses, dependency resolution, the run context and
//! the scheduler that walks stages, jobs and steps.

pub mod cancel;
pub mod context;
pub mod dependency;
pub mod scheduler;
pub mod status;

pub use cancel::CancellationToken;
pub use context::{JobOutcome, PipelineRunContext};
pub use dependency::{
    DependencyGraph, DependencyGraphBuilder, DependencyNode, DependencyResolver, JobAction,
};
pub use scheduler::{log_evaluated_variables, RunReport, Scheduler};
pub use status::{StatusLedger, StatusType};
