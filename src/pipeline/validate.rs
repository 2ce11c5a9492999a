//! Static checks on a loaded pipeline.
//!
//! Nothing here blocks a run; the scheduler tolerates every problem reported
//! (missing dependencies and cycles end as `Error`, templates as `Warning`).
//! The checks exist so `conveyor check` can report them before anything runs.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use super::model::{Job, Pipeline, StepKind};
use crate::runner::DependencyGraph;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The run will end in `Error`.
    Error,
    /// The run will degrade to `Warning`, or a unit does nothing.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A problem found in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity of this diagnostic.
    pub severity: Severity,
    /// Where the problem is, e.g. `Build/test`.
    pub location: String,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    fn error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            location: location.into(),
            message: message.into(),
        }
    }

    fn warning(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.location, self.message)
    }
}

/// Check a pipeline, returning every problem found in declaration order.
///
/// # Example
///
/// ```
/// use conveyor::pipeline::{validate, JobSpec, Pipeline, Severity, Stage, Step};
///
/// let test = JobSpec::new("test")
///     .depends_on("compile")
///     .with_step(Step::script("cargo test"));
/// let pipeline = Pipeline {
///     stages: vec![Stage::new("Build").with_job(test)],
///     ..Default::default()
/// };
///
/// let diagnostics = validate(&pipeline);
/// assert_eq!(diagnostics.len(), 1);
/// assert_eq!(diagnostics[0].severity, Severity::Error);
/// assert!(diagnostics[0].message.contains("compile"));
/// ```
pub fn validate(pipeline: &Pipeline) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if pipeline.stages.is_empty() {
        diagnostics.push(Diagnostic::warning("pipeline", "pipeline has no stages"));
    }

    let mut stage_names = HashSet::new();
    for (stage_index, stage) in pipeline.stages.iter().enumerate() {
        let stage_label = stage.label(stage_index);

        if let Some(name) = &stage.name {
            if !stage_names.insert(name.as_str()) {
                diagnostics.push(Diagnostic::warning(
                    &stage_label,
                    format!("duplicate stage name '{}'", name),
                ));
            }
        }

        if stage.jobs.is_empty() {
            diagnostics.push(Diagnostic::warning(&stage_label, "stage has no jobs"));
            continue;
        }

        check_jobs(&stage_label, &stage.jobs, &mut diagnostics);
    }

    diagnostics
}

fn check_jobs(stage_label: &str, jobs: &[Job], diagnostics: &mut Vec<Diagnostic>) {
    let mut names = HashSet::new();

    for (index, job) in jobs.iter().enumerate() {
        let location = format!("{}/{}", stage_label, job.label(index));

        let Some(spec) = job.spec() else {
            diagnostics.push(Diagnostic::warning(
                &location,
                "job template was not expanded; the job will be reported as a warning",
            ));
            continue;
        };

        if let Some(name) = &spec.name {
            if !names.insert(name.as_str()) {
                diagnostics.push(Diagnostic::error(
                    &location,
                    format!("duplicate job name '{}'; dependencies resolve to the first", name),
                ));
            }
        } else if !spec.depends_on.is_empty() {
            diagnostics.push(Diagnostic::warning(
                &location,
                "unnamed job declares dependencies; other jobs cannot depend on it",
            ));
        }

        if spec.steps.is_empty() {
            diagnostics.push(Diagnostic::warning(&location, "job has no steps"));
        }

        for (step_index, step) in spec.steps.iter().enumerate() {
            if let StepKind::Template(t) = &step.kind {
                diagnostics.push(Diagnostic::warning(
                    format!("{}/{}", location, step.label(step_index)),
                    format!("step template '{}' was not expanded; no runner will handle it", t.template),
                ));
            }
        }
    }

    let graph = DependencyGraph::from_nodes(jobs);
    for (job, dependency) in graph.unknown_dependencies() {
        diagnostics.push(Diagnostic::error(
            format!("{}/{}", stage_label, job),
            format!("depends on unknown job '{}'", dependency),
        ));
    }
    if let Some(cycle) = graph.find_cycle() {
        diagnostics.push(Diagnostic::error(
            stage_label,
            format!("circular dependency: {}", cycle.join(" -> ")),
        ));
    }
}
