//! Error types for Conveyor operations.
//!
//! This module defines [`ConveyorError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Scheduling outcomes (failed steps, skipped dependents, missing runners) are
//!   expressed as [`StatusType`](crate::runner::StatusType) values, not errors
//! - Use `ConveyorError` for conditions that must cross a scheduler layer
//!   (cancellation, infrastructure failures) or that the host has to report
//! - Use `anyhow::Error` (via `ConveyorError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for Conveyor operations.
#[derive(Debug, Error)]
pub enum ConveyorError {
    /// Pipeline file not found at expected location.
    #[error("Pipeline not found: {path}")]
    PipelineNotFound { path: PathBuf },

    /// Failed to parse a pipeline file.
    #[error("Failed to parse pipeline at {path}: {message}")]
    PipelineParse { path: PathBuf, message: String },

    /// Pipeline structure cannot be turned into runnable units.
    #[error("Invalid pipeline: {message}")]
    InvalidPipeline { message: String },

    /// Failed to parse the agent configuration file.
    #[error("Failed to parse agent config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// A job names a dependency that does not exist in its batch.
    #[error("Job '{job}' depends on unknown job '{dependency}'")]
    MissingDependency { job: String, dependency: String },

    /// Job dependency cycle detected.
    #[error("Circular dependency detected: {cycle}")]
    DependencyCycle { cycle: String },

    /// No runner could be resolved for a step.
    #[error("No runner found for step '{step}'")]
    StepRunnerNotFound { step: String },

    /// A step runner failed.
    #[error("Step '{step}' failed: {message}")]
    StepExecution { step: String, message: String },

    /// The run was cancelled between two units of work.
    #[error("Pipeline run cancelled")]
    Cancelled,

    /// Shell command could not be started or waited on.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Conveyor operations.
pub type Result<T> = std::result::Result<T, ConveyorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_not_found_displays_path() {
        let err = ConveyorError::PipelineNotFound {
            path: PathBuf::from("/repo/azure-pipelines.yml"),
        };
        assert!(err.to_string().contains("/repo/azure-pipelines.yml"));
    }

    #[test]
    fn pipeline_parse_displays_path_and_message() {
        let err = ConveyorError::PipelineParse {
            path: PathBuf::from("/pipeline.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/pipeline.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn missing_dependency_displays_both_names() {
        let err = ConveyorError::MissingDependency {
            job: "deploy".into(),
            dependency: "build".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("deploy"));
        assert!(msg.contains("build"));
    }

    #[test]
    fn dependency_cycle_displays_cycle() {
        let err = ConveyorError::DependencyCycle {
            cycle: "a -> b -> a".into(),
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn step_execution_displays_step_and_message() {
        let err = ConveyorError::StepExecution {
            step: "compile".into(),
            message: "exit code 2".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("compile"));
        assert!(msg.contains("exit code 2"));
    }

    #[test]
    fn cancelled_has_stable_message() {
        assert_eq!(ConveyorError::Cancelled.to_string(), "Pipeline run cancelled");
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: ConveyorError = io_err.into();
        assert!(matches!(err, ConveyorError::Io(_)));
    }

    #[test]
    fn anyhow_error_converts_to_other() {
        let err: ConveyorError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, ConveyorError::Other(_)));
        assert_eq!(err.to_string(), "boom");
    }
}
