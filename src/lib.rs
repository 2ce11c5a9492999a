//! Conveyor - a local pipeline execution agent.
//!
//! Conveyor runs a declarative pipeline (stages of jobs of steps) on the
//! current machine. It orders jobs by their dependencies, folds unit
//! statuses into a run result, resolves layered `$(name)` variables and keeps
//! secret values out of everything it logs.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Agent configuration loading
//! - [`error`] - Error types and result aliases
//! - [`log`] - Run progress logging
//! - [`pipeline`] - Pipeline model, YAML loading and validation
//! - [`runner`] - Scheduling, dependency resolution and the run context
//! - [`secrets`] - Secret masking, detection and the publish-variable directive
//! - [`shell`] - Process execution
//! - [`steps`] - Step runners and their registry
//! - [`variables`] - Layered variables and token expansion
//!
//! # Example
//!
//! ```
//! use conveyor::config::AgentConfig;
//! use conveyor::log::MemoryLog;
//! use conveyor::pipeline::parse_pipeline;
//! use conveyor::runner::{PipelineRunContext, Scheduler, StatusType};
//! use conveyor::steps::StepRegistry;
//! use std::path::Path;
//!
//! let pipeline = parse_pipeline(
//!     "steps:\n  - checkout: self\n  - checkout: none\n",
//!     Path::new("ci.yml"),
//! )
//! .unwrap();
//!
//! let registry = StepRegistry::with_builtins();
//! let mut ctx = PipelineRunContext::new(AgentConfig::default().with_host_env(false), &pipeline)
//!     .with_log(Box::new(MemoryLog::new()));
//!
//! let report = Scheduler::new(&registry).run(&pipeline, &mut ctx);
//! assert_eq!(report.status, StatusType::Skipped);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod log;
pub mod pipeline;
pub mod runner;
pub mod secrets;
pub mod shell;
pub mod steps;
pub mod variables;

pub use error::{ConveyorError, Result};
