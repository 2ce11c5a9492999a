//! Stage, job and step orchestration.
//!
//! Stages and steps run strictly in order and stop as soon as a unit ends in
//! a status that cannot continue; the last computed status is propagated.
//! Jobs run in order too, unless any job in the stage declares `dependsOn`,
//! in which case a [`DependencyResolver`] decides the order.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use super::context::{JobOutcome, PipelineRunContext};
use super::dependency::{DependencyNode, DependencyResolver, JobAction};
use super::status::StatusType;
use crate::error::{ConveyorError, Result};
use crate::log::UnitKind;
use crate::pipeline::{Job, Pipeline, Stage, Step};
use crate::steps::StepDispatcher;

/// Outcome of a whole pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Aggregate status.
    pub status: StatusType,
    /// Whether the run stopped because it was cancelled.
    pub cancelled: bool,
    /// Final status of every job that was resolved, in resolution order.
    pub jobs: Vec<JobOutcome>,
    #[serde(serialize_with = "serialize_millis", rename = "duration_ms")]
    pub duration: Duration,
}

impl RunReport {
    /// Whether the run counts as successful (no error, not cancelled).
    pub fn success(&self) -> bool {
        !self.cancelled && !self.status.is_failure()
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Walks a pipeline, asking a [`StepDispatcher`] for each step's runner.
///
/// # Example
///
/// ```
/// use conveyor::config::AgentConfig;
/// use conveyor::log::MemoryLog;
/// use conveyor::pipeline::{JobSpec, Pipeline, Stage, Step};
/// use conveyor::runner::{PipelineRunContext, Scheduler, StatusType};
/// use conveyor::steps::StepRegistry;
///
/// let pipeline = Pipeline {
///     stages: vec![Stage::new("build").with_job(
///         JobSpec::new("compile").with_step(Step::task("Unknown@1")),
///     )],
///     ..Default::default()
/// };
///
/// let registry = StepRegistry::with_builtins();
/// let mut ctx = PipelineRunContext::new(AgentConfig::default().with_host_env(false), &pipeline)
///     .with_log(Box::new(MemoryLog::new()));
///
/// let report = Scheduler::new(&registry).run(&pipeline, &mut ctx);
/// assert_eq!(report.status, StatusType::Warning);
/// ```
pub struct Scheduler<'d> {
    dispatcher: &'d dyn StepDispatcher,
}

impl<'d> Scheduler<'d> {
    pub fn new(dispatcher: &'d dyn StepDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Run every stage and report the outcome.
    ///
    /// This is the outermost boundary: errors escaping the stages are logged
    /// and turned into an `Error` report, and transient files are removed on
    /// every path.
    pub fn run(&self, pipeline: &Pipeline, ctx: &mut PipelineRunContext) -> RunReport {
        let start = Instant::now();

        let (status, cancelled) = match self.run_stages(pipeline, ctx) {
            Ok(status) => (status, false),
            Err(ConveyorError::Cancelled) => {
                ctx.log_warn("Run cancelled");
                (StatusType::Error, true)
            }
            Err(e) => {
                warn!("Run aborted: {}", e);
                ctx.log_error(&format!("Run aborted: {}", e));
                (StatusType::Error, false)
            }
        };

        ctx.cleanup();

        debug!(%status, cancelled, "Run finished");
        RunReport {
            status,
            cancelled,
            jobs: ctx.job_outcomes().to_vec(),
            duration: start.elapsed(),
        }
    }

    /// Run stages in order.
    pub fn run_stages(&self, pipeline: &Pipeline, ctx: &mut PipelineRunContext) -> Result<StatusType> {
        let total = pipeline.stages.len();
        let mut status = StatusType::Complete;

        for (index, stage) in pipeline.stages.iter().enumerate() {
            ctx.check_cancelled()?;
            let label = stage.label(index);
            ctx.log_start(UnitKind::Stage, index, total, &label);

            status = self.run_jobs(stage, &label, ctx)?;

            ctx.log_finish(UnitKind::Stage, &label, status);
            if !status.can_continue() {
                debug!(stage = %label, %status, "Stopping after stage");
                break;
            }
        }

        Ok(status)
    }

    /// Run the jobs of one stage.
    pub fn run_jobs(
        &self,
        stage: &Stage,
        stage_label: &str,
        ctx: &mut PipelineRunContext,
    ) -> Result<StatusType> {
        if stage.jobs.iter().any(|job| !job.depends_on().is_empty()) {
            self.run_dependent_jobs(stage, stage_label, ctx)
        } else {
            self.run_sequential_jobs(stage, stage_label, ctx)
        }
    }

    fn run_sequential_jobs(
        &self,
        stage: &Stage,
        stage_label: &str,
        ctx: &mut PipelineRunContext,
    ) -> Result<StatusType> {
        let total = stage.jobs.len();
        let mut status = StatusType::Complete;

        for (index, job) in stage.jobs.iter().enumerate() {
            ctx.check_cancelled()?;
            let label = job.label(index);
            status = self.run_job(stage, job, index, total, ctx)?;
            ctx.record_job(stage_label, &label, status);

            if !status.can_continue_for_job(job) {
                debug!(job = %label, %status, "Stopping after job");
                break;
            }
        }

        Ok(status)
    }

    fn run_dependent_jobs(
        &self,
        stage: &Stage,
        stage_label: &str,
        ctx: &mut PipelineRunContext,
    ) -> Result<StatusType> {
        let total = stage.jobs.len();
        let mut resolver = DependencyResolver::new(&stage.jobs);

        while let Some(action) = resolver.next_action() {
            match action {
                JobAction::Run(index) => {
                    ctx.check_cancelled()?;
                    let job = &stage.jobs[index];
                    let status = self.run_job(stage, job, index, total, ctx)?;
                    let recorded = resolver.complete(index, status);
                    if recorded != status {
                        ctx.log_warn(&format!(
                            "{} failed but continues on error",
                            job.label(index)
                        ));
                    }
                    ctx.record_job(stage_label, &job.label(index), recorded);
                }
                JobAction::Skip { index, dependency } => {
                    let label = stage.jobs[index].label(index);
                    ctx.log_warn(&format!(
                        "Skipping {}: dependency '{}' failed",
                        label, dependency
                    ));
                    ctx.log_finish(UnitKind::Job, &label, StatusType::Skipped);
                    ctx.record_job(stage_label, &label, StatusType::Skipped);
                }
                JobAction::Missing { index, dependency } => {
                    let label = stage.jobs[index].label(index);
                    let err = ConveyorError::MissingDependency {
                        job: label.clone(),
                        dependency,
                    };
                    ctx.log_error(&err.to_string());
                    ctx.log_finish(UnitKind::Job, &label, StatusType::Error);
                    ctx.record_job(stage_label, &label, StatusType::Error);
                }
                JobAction::Cycle { remaining, path } => {
                    let cycle = match path {
                        Some(path) => path.join(" -> "),
                        None => remaining
                            .iter()
                            .map(|&i| stage.jobs[i].label(i))
                            .collect::<Vec<_>>()
                            .join(", "),
                    };
                    ctx.log_error(&ConveyorError::DependencyCycle { cycle }.to_string());
                    for index in remaining {
                        let label = stage.jobs[index].label(index);
                        ctx.log_finish(UnitKind::Job, &label, StatusType::Error);
                        ctx.record_job(stage_label, &label, StatusType::Error);
                    }
                }
            }
        }

        Ok(resolver.aggregate())
    }

    /// Run one job. Runtime variables from the previous job are dropped first.
    pub fn run_job(
        &self,
        stage: &Stage,
        job: &Job,
        index: usize,
        total: usize,
        ctx: &mut PipelineRunContext,
    ) -> Result<StatusType> {
        let label = job.label(index);
        ctx.clear_runtime_variables();
        ctx.log_start(UnitKind::Job, index, total, &label);

        let status = match job.spec() {
            Some(spec) => {
                ctx.setup_job_variables(stage, job);
                if let Job::Deployment { environment, .. } = job {
                    ctx.log_info(&format!("Deploying to environment '{}'", environment));
                }
                self.run_steps(stage, job, &spec.steps, ctx)?
            }
            None => {
                ctx.log_warn(&format!("{} is an unexpanded job template", label));
                StatusType::Warning
            }
        };

        ctx.log_finish(UnitKind::Job, &label, status);
        Ok(status)
    }

    /// Run steps in order.
    pub fn run_steps(
        &self,
        stage: &Stage,
        job: &Job,
        steps: &[Step],
        ctx: &mut PipelineRunContext,
    ) -> Result<StatusType> {
        let total = steps.len();
        let mut status = StatusType::Complete;

        for (index, step) in steps.iter().enumerate() {
            ctx.check_cancelled()?;
            status = self.run_step(stage, job, step, index, total, ctx)?;
            if !status.can_continue() {
                break;
            }
        }

        Ok(status)
    }

    /// Run one step.
    ///
    /// Disabled steps are `Skipped`, steps without a runner are `Warning`, and
    /// a runner error becomes `Error`. Only cancellation propagates.
    pub fn run_step(
        &self,
        stage: &Stage,
        job: &Job,
        step: &Step,
        index: usize,
        total: usize,
        ctx: &mut PipelineRunContext,
    ) -> Result<StatusType> {
        ctx.setup_variables(stage, job, step);
        let label = ctx.expand(&step.label(index));
        ctx.log_start(UnitKind::Step, index, total, &label);

        let status = if !step.enabled {
            ctx.log_info(&format!("{} is disabled", label));
            StatusType::Skipped
        } else {
            match self.dispatcher.resolve(step) {
                None => {
                    ctx.log_warn(&ConveyorError::StepRunnerNotFound { step: label.clone() }.to_string());
                    StatusType::Warning
                }
                Some(mut runner) => match runner.run(ctx, stage, job) {
                    Ok(status) => status,
                    Err(ConveyorError::Cancelled) => return Err(ConveyorError::Cancelled),
                    Err(e) => {
                        ctx.log_error(&e.to_string());
                        StatusType::Error
                    }
                },
            }
        };

        ctx.log_finish(UnitKind::Step, &label, status);
        Ok(status)
    }
}

/// Log the effective variables for a job, masked and sorted by name.
pub fn log_evaluated_variables(stage: &Stage, job: &Job, ctx: &mut PipelineRunContext) {
    ctx.setup_job_variables(stage, job);
    let lines: Vec<String> = ctx
        .variables()
        .sorted()
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, ctx.expand(&value.to_string())))
        .collect();
    for line in lines {
        ctx.log_info(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::log::{LogLevel, MemoryLog};
    use crate::pipeline::JobSpec;
    use crate::steps::StepRunner;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Returns the status named before the `:` in the script text and records
    /// the expanded text of every step that ran.
    struct Scripted {
        outcome: String,
        ran: Rc<RefCell<Vec<String>>>,
    }

    impl StepRunner for Scripted {
        fn run(
            &mut self,
            ctx: &mut PipelineRunContext,
            _stage: &Stage,
            _job: &Job,
        ) -> Result<StatusType> {
            self.ran.borrow_mut().push(ctx.expand(&self.outcome));
            match self.outcome.split(':').next().unwrap_or_default() {
                "error" => Ok(StatusType::Error),
                "warn" => Ok(StatusType::Warning),
                "fail" => Err(ConveyorError::StepExecution {
                    step: self.outcome.clone(),
                    message: "boom".into(),
                }),
                "cancel" => {
                    ctx.cancellation().cancel();
                    Ok(StatusType::Complete)
                }
                "set" => {
                    ctx.set_variable("fromstep", "yes", false);
                    Ok(StatusType::Complete)
                }
                _ => Ok(StatusType::Complete),
            }
        }
    }

    #[derive(Default)]
    struct Fake {
        ran: Rc<RefCell<Vec<String>>>,
    }

    impl StepDispatcher for Fake {
        fn resolve(&self, step: &Step) -> Option<Box<dyn StepRunner>> {
            match &step.kind {
                crate::pipeline::StepKind::Script { script, .. } => Some(Box::new(Scripted {
                    outcome: script.clone(),
                    ran: Rc::clone(&self.ran),
                })),
                _ => None,
            }
        }
    }

    fn job(name: &str, outcome: &str) -> JobSpec {
        JobSpec::new(name).with_step(Step::script(format!("{}:{}", outcome, name)))
    }

    fn pipeline(stages: Vec<Stage>) -> Pipeline {
        Pipeline {
            stages,
            ..Default::default()
        }
    }

    fn run(p: &Pipeline) -> (RunReport, Vec<String>, MemoryLog) {
        let fake = Fake::default();
        let log = MemoryLog::new();
        let mut ctx = PipelineRunContext::new(AgentConfig::default().with_host_env(false), p)
            .with_log(Box::new(log.clone()));
        let report = Scheduler::new(&fake).run(p, &mut ctx);
        let ran = fake.ran.borrow().clone();
        (report, ran, log)
    }

    fn statuses(report: &RunReport) -> HashMap<String, StatusType> {
        report
            .jobs
            .iter()
            .map(|o| (o.job.clone(), o.status))
            .collect()
    }

    #[test]
    fn failed_dependency_skips_dependent() {
        let p = pipeline(vec![Stage::new("s")
            .with_job(job("a", "error"))
            .with_job(job("b", "ok").depends_on("a"))]);
        let (report, ran, _) = run(&p);

        assert_eq!(ran, vec!["error:a"]);
        assert_eq!(report.status, StatusType::Error);
        assert_eq!(statuses(&report)["b"], StatusType::Skipped);
    }

    #[test]
    fn disabled_step_lets_dependent_run() {
        let a = JobSpec::new("a").with_step(Step::script("ok:a").disabled());
        let p = pipeline(vec![Stage::new("s")
            .with_job(a)
            .with_job(job("b", "ok").depends_on("a"))]);
        let (report, ran, _) = run(&p);

        assert_eq!(ran, vec!["ok:b"]);
        assert_eq!(statuses(&report)["a"], StatusType::Skipped);
        assert_eq!(report.status, StatusType::Warning);
    }

    #[test]
    fn cycle_terminates_with_error() {
        let p = pipeline(vec![Stage::new("s")
            .with_job(job("a", "ok").depends_on("b"))
            .with_job(job("b", "ok").depends_on("a"))]);
        let (report, ran, log) = run(&p);

        assert!(ran.is_empty());
        assert_eq!(report.status, StatusType::Error);
        assert!(log.contains("Circular dependency"));
    }

    #[test]
    fn missing_dependency_does_not_block_siblings() {
        let p = pipeline(vec![Stage::new("s")
            .with_job(job("a", "ok").depends_on("ghost"))
            .with_job(job("b", "ok"))]);
        let (report, ran, log) = run(&p);

        assert_eq!(ran, vec!["ok:b"]);
        assert_eq!(report.status, StatusType::Error);
        assert!(log.contains("unknown job 'ghost'"));
    }

    #[test]
    fn continue_on_error_downgrades_in_dependency_mode() {
        let p = pipeline(vec![Stage::new("s")
            .with_job(job("a", "error").continue_on_error())
            .with_job(job("b", "ok").depends_on("a"))]);
        let (report, ran, _) = run(&p);

        assert_eq!(ran, vec!["error:a", "ok:b"]);
        assert_eq!(statuses(&report)["a"], StatusType::Warning);
        assert_eq!(report.status, StatusType::Warning);
    }

    #[test]
    fn sequential_jobs_stop_after_error() {
        let p = pipeline(vec![Stage::new("s")
            .with_job(job("a", "error"))
            .with_job(job("b", "ok"))]);
        let (report, ran, _) = run(&p);

        assert_eq!(ran, vec!["error:a"]);
        assert_eq!(report.status, StatusType::Error);
    }

    #[test]
    fn sequential_jobs_continue_on_error() {
        let p = pipeline(vec![Stage::new("s")
            .with_job(job("a", "error").continue_on_error())
            .with_job(job("b", "ok"))]);
        let (report, ran, _) = run(&p);

        assert_eq!(ran, vec!["error:a", "ok:b"]);
        assert_eq!(report.status, StatusType::Complete);
    }

    #[test]
    fn stages_stop_after_failure() {
        let p = pipeline(vec![
            Stage::new("one").with_job(job("a", "error")),
            Stage::new("two").with_job(job("b", "ok")),
        ]);
        let (report, ran, log) = run(&p);

        assert_eq!(ran, vec!["error:a"]);
        assert_eq!(report.status, StatusType::Error);
        assert_eq!(log.started(UnitKind::Stage), vec!["one"]);
    }

    #[test]
    fn steps_stop_after_warning() {
        let j = JobSpec::new("j")
            .with_step(Step::script("warn:1"))
            .with_step(Step::script("ok:2"));
        let (report, ran, _) = run(&pipeline(vec![Stage::new("s").with_job(j)]));

        assert_eq!(ran, vec!["warn:1"]);
        assert_eq!(report.status, StatusType::Warning);
    }

    #[test]
    fn missing_runner_is_a_warning() {
        let j = JobSpec::new("j").with_step(Step::task("Unknown@1"));
        let (report, _, log) = run(&pipeline(vec![Stage::new("s").with_job(j)]));

        assert_eq!(report.status, StatusType::Warning);
        assert!(log.contains("No runner found"));
    }

    #[test]
    fn runner_error_becomes_step_error() {
        let j = JobSpec::new("j")
            .with_step(Step::script("fail:x"))
            .with_step(Step::script("ok:y"));
        let (report, ran, log) = run(&pipeline(vec![Stage::new("s").with_job(j)]));

        assert_eq!(ran, vec!["fail:x"]);
        assert_eq!(report.status, StatusType::Error);
        assert!(!report.cancelled);
        assert_eq!(log.messages(LogLevel::Error).len(), 1);
    }

    #[test]
    fn cancellation_stops_before_next_step() {
        let j = JobSpec::new("j")
            .with_step(Step::script("cancel:1"))
            .with_step(Step::script("ok:2"));
        let (report, ran, _) = run(&pipeline(vec![Stage::new("s").with_job(j)]));

        assert_eq!(ran, vec!["cancel:1"]);
        assert!(report.cancelled);
        assert_eq!(report.status, StatusType::Error);
        assert!(!report.success());
    }

    #[test]
    fn runtime_variables_do_not_cross_jobs() {
        let first = JobSpec::new("first").with_step(Step::script("set:1"));
        let second = JobSpec::new("second").with_step(Step::script("ok:$(fromstep)"));
        let (_, ran, _) = run(&pipeline(vec![Stage::new("s")
            .with_job(first)
            .with_job(second)]));

        assert_eq!(ran, vec!["set:1", "ok:$(fromstep)"]);
    }

    #[test]
    fn template_job_is_a_warning() {
        let template = Job::Template(crate::pipeline::TemplateReference {
            template: "jobs/build.yml".into(),
            parameters: Default::default(),
        });
        let p = pipeline(vec![Stage::new("s").with_job(template)]);
        let (report, _, log) = run(&p);

        assert_eq!(report.status, StatusType::Warning);
        assert!(log.contains("unexpanded job template"));
    }

    #[test]
    fn step_labels_are_expanded_and_masked() {
        let j = JobSpec::new("j").with_step(
            Step::script("ok:1")
                .with_display_name("deploy $(target)")
                .with_env("target", "prod"),
        );
        let (_, _, log) = run(&pipeline(vec![Stage::new("s").with_job(j)]));
        assert_eq!(log.started(UnitKind::Step), vec!["deploy prod"]);
    }

    #[test]
    fn empty_pipeline_is_complete() {
        let (report, _, _) = run(&Pipeline::default());
        assert_eq!(report.status, StatusType::Complete);
        assert!(report.success());
    }

    #[test]
    fn evaluated_variables_are_masked() {
        let stage = Stage::new("s").with_variable("token", "tok3n");
        let j = Job::from(JobSpec::new("j"));
        let log = MemoryLog::new();
        let mut ctx = PipelineRunContext::new(
            AgentConfig::default().with_host_env(false),
            &Pipeline::default(),
        )
        .with_log(Box::new(log.clone()));
        ctx.add_secret("tok3n");

        log_evaluated_variables(&stage, &j, &mut ctx);
        assert!(log.contains("token=********"));
        assert!(!log.contains("tok3n"));
    }

    #[test]
    fn evaluated_variables_expand_values_but_not_names() {
        let stage = Stage::new("s")
            .with_variable("arch", "x64")
            .with_variable("$(arch)", "literal")
            .with_variable("target", "linux-$(arch)");
        let j = Job::from(JobSpec::new("j"));
        let log = MemoryLog::new();
        let mut ctx = PipelineRunContext::new(
            AgentConfig::default().with_host_env(false),
            &Pipeline::default(),
        )
        .with_log(Box::new(log.clone()));

        log_evaluated_variables(&stage, &j, &mut ctx);
        let info = log.messages(LogLevel::Info);
        assert!(info.contains(&"$(arch)=literal".to_string()), "{info:?}");
        assert!(info.contains(&"target=linux-x64".to_string()), "{info:?}");
        assert!(!info.contains(&"x64=literal".to_string()));
    }
}
