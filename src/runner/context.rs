//! Per-run state shared by the scheduler and step runners.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::cancel::CancellationToken;
use super::status::StatusType;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::log::{ConsoleLog, RunLog, UnitKind};
use crate::pipeline::{Job, Pipeline, Stage, Step};
use crate::secrets::{parse_set_variable, SecretMatcher, SecretVault};
use crate::variables::{
    agent_facts, build_facts, host_environment, Variable, VariableMap, VariableStore,
};

/// Final status of one job, in the order jobs finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub stage: String,
    pub job: String,
    pub status: StatusType,
}

/// Everything one pipeline run owns: variables, secrets, the progress log,
/// the cancellation token and the files it created.
///
/// Every message handed to the log goes through [`mask_secrets`](Self::mask_secrets)
/// first. Transient files registered with [`track_artifact`](Self::track_artifact)
/// are removed by [`cleanup`](Self::cleanup), which also runs on drop.
///
/// # Example
///
/// ```
/// use conveyor::config::AgentConfig;
/// use conveyor::log::MemoryLog;
/// use conveyor::pipeline::Pipeline;
/// use conveyor::runner::PipelineRunContext;
///
/// let config = AgentConfig::default().with_host_env(false);
/// let log = MemoryLog::new();
/// let mut ctx = PipelineRunContext::new(config, &Pipeline::default())
///     .with_log(Box::new(log.clone()));
///
/// ctx.process_output_line("##vso[task.setvariable variable=token;isSecret=true]s3cr3t");
///
/// assert_eq!(ctx.expand("$(token)"), "s3cr3t");
/// assert_eq!(ctx.mask_secrets("token=s3cr3t"), "token=********");
/// assert!(!log.contains("s3cr3t"));
/// ```
pub struct PipelineRunContext {
    config: AgentConfig,
    store: VariableStore,
    vault: SecretVault,
    log: Box<dyn RunLog>,
    cancel: CancellationToken,
    artifacts: Vec<PathBuf>,
    artifact_counter: usize,
    jobs: Vec<JobOutcome>,
}

impl PipelineRunContext {
    /// Build the context for running `pipeline` with `config`.
    ///
    /// Fixed agent and build facts are derived from the config, the host
    /// environment is layered in when enabled, and config variables are
    /// appended after the pipeline's own so they take precedence.
    pub fn new(config: AgentConfig, pipeline: &Pipeline) -> Self {
        let definition = pipeline.name.as_deref().unwrap_or("pipeline");

        let host = if config.include_host_env {
            host_environment()
        } else {
            VariableMap::new()
        };

        let mut vault = SecretVault::new();
        vault.add_secrets(config.secrets.iter().cloned());
        if config.mask_host_secrets {
            let matcher = SecretMatcher::with_builtins_and_custom(&config.secret_env);
            vault.add_secrets(matcher.secret_values(&host));
        }

        let mut variables: Vec<Variable> = pipeline.variables.clone();
        variables.extend(config.extra_variables());

        let store = VariableStore::new()
            .with_agent_facts(agent_facts(&config))
            .with_build_facts(build_facts(&config, definition))
            .with_host_env(host)
            .with_pipeline(variables);

        debug!(secrets = vault.len(), "Run context created");

        Self {
            log: Box::new(ConsoleLog::new(false, false)),
            config,
            store,
            vault,
            cancel: CancellationToken::new(),
            artifacts: Vec::new(),
            artifact_counter: 0,
            jobs: Vec::new(),
        }
    }

    /// Replace the progress log.
    pub fn with_log(mut self, log: Box<dyn RunLog>) -> Self {
        self.log = log;
        self
    }

    /// Use a cancellation token shared with the host.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replace the variable store, e.g. to pin the clock in tests.
    pub fn with_store(mut self, store: VariableStore) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Working directory steps run in by default.
    pub fn work_dir(&self) -> PathBuf {
        self.config.work_dir()
    }

    pub fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }

    // Variables

    /// Rebind variable scopes for a step.
    ///
    /// The previous step's scope is dropped so its shadowing cannot leak.
    pub fn setup_variables(&mut self, stage: &Stage, job: &Job, step: &Step) {
        self.store.bind(&stage.variables, job.variables(), &step.env);
    }

    /// Rebind variable scopes for a job without a step scope.
    pub fn setup_job_variables(&mut self, stage: &Stage, job: &Job) {
        self.store.bind(&stage.variables, job.variables(), &[]);
    }

    /// Drop variables set by earlier steps; called at every job boundary.
    pub fn clear_runtime_variables(&mut self) {
        self.store.clear_runtime();
    }

    /// Set a runtime variable, registering its value as a secret if asked.
    pub fn set_variable(&mut self, name: &str, value: &str, is_secret: bool) {
        if is_secret {
            self.vault.add_secret(value);
        }
        debug!(name, is_secret, "Runtime variable set");
        self.store.set_runtime(name, value);
    }

    pub fn add_secret(&mut self, value: impl Into<String>) {
        self.vault.add_secret(value);
    }

    /// Expand every resolvable token in `text`.
    pub fn expand(&self, text: &str) -> String {
        self.store.expand(text)
    }

    /// Look up and expand a variable.
    pub fn render(&self, name: &str) -> Option<String> {
        self.store.render(name)
    }

    /// The flattened variables for the bound scopes.
    pub fn variables(&self) -> &VariableMap {
        self.store.lookup()
    }

    pub fn secrets(&self) -> &SecretVault {
        &self.vault
    }

    pub fn mask_secrets(&self, text: &str) -> String {
        self.vault.mask(text)
    }

    /// Environment handed to step processes.
    ///
    /// Names are upper-cased with `.` replaced by `_`, values are expanded, and
    /// variables whose value is a registered secret are left out.
    pub fn step_environment(&self) -> HashMap<String, String> {
        let lookup = self.store.lookup();
        lookup
            .iter()
            .filter_map(|(name, value)| {
                let value = self.store.expand(&value.to_string());
                if self.vault.contains(&value) {
                    return None;
                }
                Some((env_name(name), value))
            })
            .collect()
    }

    // Output and logging

    /// Handle a line of step output.
    ///
    /// A publish-variable directive registers the secret (when flagged) before
    /// the variable is stored and before the line is logged, so the echoed
    /// line is already masked.
    pub fn process_output_line(&mut self, line: &str) {
        if let Some(directive) = parse_set_variable(line) {
            self.set_variable(&directive.name, &directive.value, directive.is_secret);
        }
        let masked = self.vault.mask(line);
        self.log.output(&masked);
    }

    pub fn log_info(&mut self, msg: &str) {
        let masked = self.vault.mask(msg);
        self.log.info(&masked);
    }

    pub fn log_warn(&mut self, msg: &str) {
        let masked = self.vault.mask(msg);
        self.log.warn(&masked);
    }

    pub fn log_error(&mut self, msg: &str) {
        let masked = self.vault.mask(msg);
        self.log.error(&masked);
    }

    pub fn log_start(&mut self, unit: UnitKind, index: usize, total: usize, name: &str) {
        let masked = self.vault.mask(name);
        self.log.start(unit, index, total, &masked);
    }

    pub fn log_finish(&mut self, unit: UnitKind, name: &str, status: StatusType) {
        let masked = self.vault.mask(name);
        self.log.finish(unit, &masked, status);
    }

    // Lifecycle

    /// Path for a new transient file under the agent temp directory.
    ///
    /// The file is not created, but it is tracked for cleanup.
    pub fn new_artifact_path(&mut self, prefix: &str, extension: &str) -> PathBuf {
        self.artifact_counter += 1;
        let name = format!(
            "{}-{}-{}.{}",
            prefix,
            std::process::id(),
            self.artifact_counter,
            extension
        );
        let path = self.config.temp_dir().join(name);
        self.track_artifact(&path);
        path
    }

    /// Remember a transient file to delete when the run ends.
    pub fn track_artifact(&mut self, path: impl AsRef<Path>) {
        self.artifacts.push(path.as_ref().to_path_buf());
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Delete every tracked transient file. Safe to call more than once.
    pub fn cleanup(&mut self) {
        for path in self.artifacts.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed transient file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => debug!(path = %path.display(), error = %e, "Could not remove transient file"),
            }
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail with `Cancelled` if the host asked the run to stop.
    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }

    /// Record a job's final status for the run report.
    pub fn record_job(&mut self, stage: &str, job: &str, status: StatusType) {
        self.jobs.push(JobOutcome {
            stage: stage.to_string(),
            job: job.to_string(),
            status,
        });
    }

    pub fn job_outcomes(&self) -> &[JobOutcome] {
        &self.jobs
    }
}

impl Drop for PipelineRunContext {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn env_name(name: &str) -> String {
    name.replace('.', "_").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogLevel, MemoryLog};
    use crate::pipeline::JobSpec;
    use tempfile::TempDir;

    fn context() -> (PipelineRunContext, MemoryLog) {
        let log = MemoryLog::new();
        let ctx = PipelineRunContext::new(
            AgentConfig::default().with_host_env(false),
            &Pipeline::default(),
        )
        .with_log(Box::new(log.clone()));
        (ctx, log)
    }

    #[test]
    fn set_variable_then_expand() {
        let (mut ctx, _) = context();
        ctx.set_variable("MyVar", "Value1", false);
        assert_eq!(ctx.expand("$(MyVar)"), "Value1");
    }

    #[test]
    fn secret_directive_is_masked_in_echo() {
        let (mut ctx, log) = context();
        ctx.process_output_line("##vso[task.setvariable variable=pw;isSecret=true]hunter2");
        ctx.process_output_line("password is hunter2");

        assert_eq!(ctx.render("pw").as_deref(), Some("hunter2"));
        let output = log.messages(LogLevel::Output);
        assert_eq!(output.len(), 2);
        assert!(output.iter().all(|l| !l.contains("hunter2")));
        assert_eq!(output[1], "password is ********");
    }

    #[test]
    fn plain_directive_is_logged_verbatim() {
        let (mut ctx, log) = context();
        ctx.process_output_line("##vso[task.setvariable variable=color]blue");
        assert_eq!(ctx.render("color").as_deref(), Some("blue"));
        assert!(log.contains("]blue"));
    }

    #[test]
    fn log_methods_mask_secrets() {
        let (mut ctx, log) = context();
        ctx.add_secret("s3cr3t");
        ctx.log_info("value=s3cr3t");
        ctx.log_warn("s3cr3t!");
        ctx.log_error("oops s3cr3t");
        assert!(!log.contains("s3cr3t"));
        assert_eq!(log.messages(LogLevel::Info), vec!["value=********"]);
    }

    #[test]
    fn runtime_variables_clear_at_job_boundary() {
        let (mut ctx, _) = context();
        ctx.set_variable("x", "1", false);
        ctx.clear_runtime_variables();
        assert_eq!(ctx.expand("$(x)"), "$(x)");
    }

    #[test]
    fn step_scope_does_not_leak_into_next_step() {
        let (mut ctx, _) = context();
        let stage = Stage::new("s").with_variable("v", "stage");
        let job = Job::from(JobSpec::new("j"));
        let first = Step::script("a").with_env("v", "step");
        let second = Step::script("b");

        ctx.setup_variables(&stage, &job, &first);
        assert_eq!(ctx.render("v").as_deref(), Some("step"));
        ctx.setup_variables(&stage, &job, &second);
        assert_eq!(ctx.render("v").as_deref(), Some("stage"));
    }

    #[test]
    fn config_variables_override_pipeline() {
        let pipeline = Pipeline {
            variables: vec![Variable::simple("mode", "debug")],
            ..Default::default()
        };
        let config = AgentConfig::default()
            .with_host_env(false)
            .with_variable("mode", "release");
        let ctx = PipelineRunContext::new(config, &pipeline);
        assert_eq!(ctx.render("mode").as_deref(), Some("release"));
    }

    #[test]
    fn config_secrets_are_registered() {
        let config = AgentConfig::default()
            .with_host_env(false)
            .with_secret("tok3n");
        let ctx = PipelineRunContext::new(config, &Pipeline::default());
        assert_eq!(ctx.mask_secrets("a tok3n"), "a ********");
    }

    #[test]
    fn step_environment_normalizes_names_and_hides_secrets() {
        let (mut ctx, _) = context();
        ctx.set_variable("build.flavor", "fast", false);
        ctx.set_variable("api.pass", "p4ss", true);
        let env = ctx.step_environment();

        assert_eq!(env.get("BUILD_FLAVOR").map(String::as_str), Some("fast"));
        assert!(!env.contains_key("API_PASS"));
        assert!(env.contains_key("AGENT_NAME"));
    }

    #[test]
    fn cleanup_removes_tracked_files() {
        let temp = TempDir::new().unwrap();
        let config = AgentConfig::default()
            .with_host_env(false)
            .with_work_dir(temp.path());
        let mut ctx = PipelineRunContext::new(config, &Pipeline::default());

        let path = ctx.new_artifact_path("script", "sh");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "echo").unwrap();
        let missing = temp.path().join("never-created");
        ctx.track_artifact(&missing);

        ctx.cleanup();
        assert!(!path.exists());
        assert!(ctx.artifacts().is_empty());
    }

    #[test]
    fn drop_runs_cleanup() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("transient.txt");
        fs::write(&file, "x").unwrap();
        {
            let (mut ctx, _) = context();
            ctx.track_artifact(&file);
        }
        assert!(!file.exists());
    }

    #[test]
    fn cancellation_is_shared_with_host() {
        let token = CancellationToken::new();
        let (ctx, _) = context();
        let ctx = ctx.with_cancellation(token.clone());
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(ctx.check_cancelled().is_err());
    }
}
