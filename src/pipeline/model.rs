//! The pre-parsed pipeline object graph the scheduler walks.
//!
//! Each polymorphic element is a closed enum decided once at load time.

use std::collections::BTreeMap;

use crate::runner::DependencyNode;
use crate::variables::{Scalar, Variable};

/// A whole pipeline: variables plus an ordered list of stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub name: Option<String>,
    pub variables: Vec<Variable>,
    pub stages: Vec<Stage>,
}

/// An ordered group of jobs sharing stage-level variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stage {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub variables: Vec<Variable>,
    pub jobs: Vec<Job>,
}

impl Stage {
    /// Create an empty stage with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Add a job.
    pub fn with_job(mut self, job: impl Into<Job>) -> Self {
        self.jobs.push(job.into());
        self
    }

    /// Add a stage-level variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.variables.push(Variable::simple(name, value));
        self
    }

    /// Name shown in logs.
    pub fn label(&self, index: usize) -> String {
        label(&self.display_name, &self.name, "Stage", index)
    }
}

/// A job in a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    /// An ordinary job with steps.
    Standard(JobSpec),
    /// A deployment job targeting an environment.
    Deployment { spec: JobSpec, environment: String },
    /// A reference to a job template that was not expanded upstream.
    Template(TemplateReference),
}

impl Job {
    /// The runnable part of the job, absent for template references.
    pub fn spec(&self) -> Option<&JobSpec> {
        match self {
            Job::Standard(spec) | Job::Deployment { spec, .. } => Some(spec),
            Job::Template(_) => None,
        }
    }

    /// Name shown in logs.
    pub fn label(&self, index: usize) -> String {
        match self {
            Job::Standard(spec) | Job::Deployment { spec, .. } => spec.label(index),
            Job::Template(t) => format!("template {}", t.template),
        }
    }

    /// Job-level variables.
    pub fn variables(&self) -> &[Variable] {
        self.spec().map(|s| s.variables.as_slice()).unwrap_or_default()
    }
}

impl From<JobSpec> for Job {
    fn from(spec: JobSpec) -> Self {
        Job::Standard(spec)
    }
}

impl DependencyNode for Job {
    fn name(&self) -> Option<&str> {
        self.spec().and_then(|s| s.name.as_deref())
    }

    fn depends_on(&self) -> &[String] {
        self.spec().map(|s| s.depends_on.as_slice()).unwrap_or_default()
    }

    fn continue_on_error(&self) -> bool {
        self.spec().is_some_and(|s| s.continue_on_error)
    }
}

/// The fields shared by standard and deployment jobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobSpec {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub depends_on: Vec<String>,
    pub continue_on_error: bool,
    pub variables: Vec<Variable>,
    pub steps: Vec<Step>,
}

impl JobSpec {
    /// Create an empty job with a name.
    ///
    /// # Example
    ///
    /// ```
    /// use conveyor::pipeline::{JobSpec, Step};
    ///
    /// let job = JobSpec::new("test")
    ///     .depends_on("build")
    ///     .continue_on_error()
    ///     .with_step(Step::script("cargo test"));
    ///
    /// assert_eq!(job.depends_on, vec!["build".to_string()]);
    /// assert!(job.continue_on_error);
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Add a dependency.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    /// Tolerate errors in this job.
    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    /// Add a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Add a job-level variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.variables.push(Variable::simple(name, value));
        self
    }

    /// Name shown in logs.
    pub fn label(&self, index: usize) -> String {
        label(&self.display_name, &self.name, "Job", index)
    }
}

/// A reference to a template file.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateReference {
    pub template: String,
    pub parameters: BTreeMap<String, Scalar>,
}

/// A step in a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub enabled: bool,
    /// Step-level variables.
    pub env: Vec<Variable>,
    pub kind: StepKind,
}

/// What a step does.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// Inline script run by a shell.
    Script {
        script: String,
        /// Interpreter hint such as `bash`, `pwsh` or `script`.
        interpreter: String,
    },
    /// A named task with inputs, e.g. `CmdLine@2`.
    Task {
        task: String,
        inputs: BTreeMap<String, Scalar>,
    },
    /// Source checkout.
    Checkout { repository: String },
    /// Reference to a step template that was not expanded upstream.
    Template(TemplateReference),
}

impl Step {
    /// Create an enabled step.
    pub fn new(kind: StepKind) -> Self {
        Self {
            name: None,
            display_name: None,
            enabled: true,
            env: Vec::new(),
            kind,
        }
    }

    /// Create an inline script step.
    pub fn script(script: impl Into<String>) -> Self {
        Self::new(StepKind::Script {
            script: script.into(),
            interpreter: "script".to_string(),
        })
    }

    /// Create a task step.
    pub fn task(task: impl Into<String>) -> Self {
        Self::new(StepKind::Task {
            task: task.into(),
            inputs: BTreeMap::new(),
        })
    }

    /// Set the step name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Add a task input. Ignored for non-task steps.
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        if let StepKind::Task { inputs, .. } = &mut self.kind {
            inputs.insert(name.into(), value.into());
        }
        self
    }

    /// Add a step-level variable.
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.env.push(Variable::simple(name, value));
        self
    }

    /// Mark the step as disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Name shown in logs.
    pub fn label(&self, index: usize) -> String {
        if let Some(label) = self.display_name.as_ref().or(self.name.as_ref()) {
            return label.clone();
        }
        match &self.kind {
            StepKind::Script { script, .. } => {
                let first = script.lines().next().unwrap_or_default().trim();
                if first.is_empty() {
                    format!("Step {}", index + 1)
                } else {
                    first.to_string()
                }
            }
            StepKind::Task { task, .. } => task.clone(),
            StepKind::Checkout { repository } => format!("Checkout {}", repository),
            StepKind::Template(t) => format!("template {}", t.template),
        }
    }
}

fn label(display: &Option<String>, name: &Option<String>, kind: &str, index: usize) -> String {
    display
        .as_ref()
        .or(name.as_ref())
        .cloned()
        .unwrap_or_else(|| format!("{} {}", kind, index + 1))
}
