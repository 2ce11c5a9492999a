//! Script runner for inline scripts and script-file tasks.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::StepRunner;
use crate::error::{ConveyorError, Result};
use crate::pipeline::{Job, Stage, Step, StepKind};
use crate::runner::{PipelineRunContext, StatusType};
use crate::shell::{
    execute_streaming, interpreter_command, script_extension, CommandOptions, OutputLine,
};
use crate::variables::Scalar;

/// What a [`ScriptRunner`] executes.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptSource {
    /// Script text, written to a transient file before running.
    Inline(String),
    /// An existing script file and its argument string.
    File { path: String, arguments: String },
}

/// Runs a script with an interpreter, streaming its output through the run
/// context so publish-variable directives take effect and secrets are masked.
///
/// Exit code 0 is `Complete`, anything else is `Error`.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    label: String,
    source: ScriptSource,
    interpreter: String,
    working_directory: Option<String>,
}

impl ScriptRunner {
    /// Create a runner.
    pub fn new(label: impl Into<String>, source: ScriptSource, interpreter: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            source,
            interpreter: interpreter.into(),
            working_directory: None,
        }
    }

    /// Run in `dir` (expanded, relative to the agent working directory).
    pub fn in_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Constructor for `script`, `bash` and `pwsh` steps.
    pub fn for_script(step: &Step) -> Option<Box<dyn StepRunner>> {
        match &step.kind {
            StepKind::Script {
                script,
                interpreter,
            } => Some(Box::new(Self::new(
                step.label(0),
                ScriptSource::Inline(script.clone()),
                interpreter.as_str(),
            ))),
            _ => None,
        }
    }

    /// Constructor for `CmdLine@2` (inputs: `script`, `workingDirectory`).
    pub fn for_cmdline_task(step: &Step) -> Option<Box<dyn StepRunner>> {
        let inputs = TaskInputs::of(step)?;
        let runner = Self::new(
            step.label(0),
            ScriptSource::Inline(inputs.get("script").unwrap_or_default()),
            "script",
        );
        Some(Box::new(inputs.with_directory(runner, "workingDirectory")))
    }

    /// Constructor for `Bash@3` (inputs: `targetType`, `script`, `filePath`,
    /// `arguments`, `workingDirectory`).
    pub fn for_bash_task(step: &Step) -> Option<Box<dyn StepRunner>> {
        let inputs = TaskInputs::of(step)?;
        let is_file = inputs
            .get("targetType")
            .is_some_and(|t| t.eq_ignore_ascii_case("filePath"));
        let source = if is_file {
            ScriptSource::File {
                path: inputs.get("filePath").unwrap_or_default(),
                arguments: inputs.get("arguments").unwrap_or_default(),
            }
        } else {
            ScriptSource::Inline(inputs.get("script").unwrap_or_default())
        };
        let runner = Self::new(step.label(0), source, "bash");
        Some(Box::new(inputs.with_directory(runner, "workingDirectory")))
    }

    /// Constructor for `ShellScript@2` (inputs: `scriptPath`, `args`, `cwd`).
    pub fn for_shell_script_task(step: &Step) -> Option<Box<dyn StepRunner>> {
        let inputs = TaskInputs::of(step)?;
        let source = ScriptSource::File {
            path: inputs.get("scriptPath").unwrap_or_default(),
            arguments: inputs.get("args").unwrap_or_default(),
        };
        let runner = Self::new(step.label(0), source, "sh");
        Some(Box::new(inputs.with_directory(runner, "cwd")))
    }

    fn working_dir(&self, ctx: &PipelineRunContext) -> PathBuf {
        let base = ctx.work_dir();
        match &self.working_directory {
            Some(dir) if !dir.trim().is_empty() => resolve_path(&base, &ctx.expand(dir)),
            _ => base,
        }
    }

    /// Program and arguments for the run, creating the transient file for
    /// inline scripts.
    fn prepare(&self, ctx: &mut PipelineRunContext) -> Result<(String, Vec<String>)> {
        match &self.source {
            ScriptSource::Inline(script) => {
                let content = ctx.expand(script);
                let path = ctx.new_artifact_path("script", script_extension(&self.interpreter));
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, content)?;
                debug!(path = %path.display(), "Wrote script file");
                Ok(interpreter_command(&self.interpreter, &path))
            }
            ScriptSource::File { path, arguments } => {
                let expanded = ctx.expand(path);
                if expanded.trim().is_empty() {
                    return Err(ConveyorError::StepExecution {
                        step: self.label.clone(),
                        message: "no script file given".to_string(),
                    });
                }
                let path = resolve_path(&ctx.work_dir(), &expanded);
                let (program, mut args) = interpreter_command(&self.interpreter, &path);
                args.extend(ctx.expand(arguments).split_whitespace().map(String::from));
                Ok((program, args))
            }
        }
    }
}

impl StepRunner for ScriptRunner {
    fn run(
        &mut self,
        ctx: &mut PipelineRunContext,
        _stage: &Stage,
        _job: &Job,
    ) -> Result<StatusType> {
        if ctx.is_dry_run() {
            let preview = match &self.source {
                ScriptSource::Inline(script) => ctx.expand(script),
                ScriptSource::File { path, arguments } => {
                    format!("{} {}", ctx.expand(path), ctx.expand(arguments))
                }
            };
            let first = preview.lines().next().unwrap_or_default().trim().to_string();
            ctx.log_info(&format!("Would run: {}", first));
            return Ok(StatusType::Complete);
        }

        let (program, args) = self.prepare(ctx)?;
        let options = CommandOptions {
            cwd: Some(self.working_dir(ctx)),
            env: ctx.step_environment(),
        };

        let result = execute_streaming(&program, &args, &options, &mut |line: OutputLine| {
            ctx.process_output_line(line.text())
        })?;

        if result.success {
            Ok(StatusType::Complete)
        } else {
            let code = result
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string());
            ctx.log_error(&format!("'{}' exited with code {}", self.label, code));
            Ok(StatusType::Error)
        }
    }
}

/// Case-insensitive view over a task step's inputs.
struct TaskInputs<'a> {
    inputs: &'a std::collections::BTreeMap<String, Scalar>,
}

impl<'a> TaskInputs<'a> {
    fn of(step: &'a Step) -> Option<Self> {
        match &step.kind {
            StepKind::Task { inputs, .. } => Some(Self { inputs }),
            _ => None,
        }
    }

    fn get(&self, name: &str) -> Option<String> {
        self.inputs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.to_string())
    }

    fn with_directory(&self, runner: ScriptRunner, input: &str) -> ScriptRunner {
        match self.get(input) {
            Some(dir) => runner.in_directory(dir),
            None => runner,
        }
    }
}

fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::log::{LogLevel, MemoryLog};
    use crate::pipeline::{JobSpec, Pipeline};
    use tempfile::TempDir;

    fn context(temp: &TempDir, dry_run: bool) -> (PipelineRunContext, MemoryLog) {
        let log = MemoryLog::new();
        let config = AgentConfig::default()
            .with_host_env(false)
            .with_work_dir(temp.path())
            .with_dry_run(dry_run);
        let ctx = PipelineRunContext::new(config, &Pipeline::default())
            .with_log(Box::new(log.clone()));
        (ctx, log)
    }

    fn run(step: &Step, ctx: &mut PipelineRunContext) -> Result<StatusType> {
        let stage = Stage::new("s");
        let job = Job::from(JobSpec::new("j"));
        ctx.setup_variables(&stage, &job, step);
        let mut runner = match &step.kind {
            StepKind::Script { .. } => ScriptRunner::for_script(step),
            StepKind::Task { task, .. } if task.eq_ignore_ascii_case("bash@3") => {
                ScriptRunner::for_bash_task(step)
            }
            StepKind::Task { task, .. } if task.eq_ignore_ascii_case("shellscript@2") => {
                ScriptRunner::for_shell_script_task(step)
            }
            _ => ScriptRunner::for_cmdline_task(step),
        }
        .unwrap();
        runner.run(ctx, &stage, &job)
    }

    #[test]
    fn inline_script_runs_in_work_dir_with_expanded_variables() {
        let temp = TempDir::new().unwrap();
        let (mut ctx, log) = context(&temp, false);
        let step = Step::script("echo $(greeting) > out.txt\necho done")
            .with_env("greeting", "hello");

        assert_eq!(run(&step, &mut ctx).unwrap(), StatusType::Complete);
        let written = fs::read_to_string(temp.path().join("out.txt")).unwrap();
        assert_eq!(written.trim(), "hello");
        assert_eq!(log.messages(LogLevel::Output), vec!["done"]);
    }

    #[test]
    fn failing_script_is_error() {
        let temp = TempDir::new().unwrap();
        let (mut ctx, log) = context(&temp, false);

        assert_eq!(
            run(&Step::script("exit 4"), &mut ctx).unwrap(),
            StatusType::Error
        );
        assert!(log.contains("exited with code 4"));
    }

    #[test]
    fn script_files_are_cleaned_up() {
        let temp = TempDir::new().unwrap();
        let (mut ctx, _) = context(&temp, false);
        run(&Step::script("true"), &mut ctx).unwrap();

        let tracked = ctx.artifacts().to_vec();
        assert_eq!(tracked.len(), 1);
        assert!(tracked[0].exists());
        ctx.cleanup();
        assert!(!tracked[0].exists());
    }

    #[test]
    fn script_output_can_publish_variables() {
        let temp = TempDir::new().unwrap();
        let (mut ctx, log) = context(&temp, false);
        let step = Step::script("echo '##vso[task.setvariable variable=key;isSecret=true]abc123'");

        run(&step, &mut ctx).unwrap();
        assert_eq!(ctx.render("key").as_deref(), Some("abc123"));
        assert!(!log.contains("abc123"));
    }

    #[test]
    fn variables_reach_the_process_environment() {
        let temp = TempDir::new().unwrap();
        let (mut ctx, _) = context(&temp, false);
        let step = Step::script("echo \"$BUILD_MODE\" > mode.txt").with_env("build.mode", "fast");

        run(&step, &mut ctx).unwrap();
        let mode = fs::read_to_string(temp.path().join("mode.txt")).unwrap();
        assert_eq!(mode.trim(), "fast");
    }

    #[test]
    fn dry_run_logs_instead_of_running() {
        let temp = TempDir::new().unwrap();
        let (mut ctx, log) = context(&temp, true);

        let status = run(&Step::script("touch marker"), &mut ctx).unwrap();
        assert_eq!(status, StatusType::Complete);
        assert!(!temp.path().join("marker").exists());
        assert!(log.contains("Would run: touch marker"));
    }

    #[test]
    fn bash_task_runs_inline_script_in_working_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        let (mut ctx, _) = context(&temp, false);
        let step = Step::task("Bash@3")
            .with_input("targetType", "inline")
            .with_input("script", "pwd > where.txt")
            .with_input("workingDirectory", "sub");

        assert_eq!(run(&step, &mut ctx).unwrap(), StatusType::Complete);
        assert!(temp.path().join("sub/where.txt").exists());
    }

    #[test]
    fn shell_script_task_runs_file_with_arguments() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("build.sh"), "echo \"$1-$2\" > args.txt\n").unwrap();
        let (mut ctx, _) = context(&temp, false);
        let step = Step::task("ShellScript@2")
            .with_input("scriptPath", "build.sh")
            .with_input("args", "one two");

        assert_eq!(run(&step, &mut ctx).unwrap(), StatusType::Complete);
        let args = fs::read_to_string(temp.path().join("args.txt")).unwrap();
        assert_eq!(args.trim(), "one-two");
    }

    #[test]
    fn file_task_without_path_is_an_execution_error() {
        let temp = TempDir::new().unwrap();
        let (mut ctx, _) = context(&temp, false);
        let err = run(&Step::task("ShellScript@2"), &mut ctx).unwrap_err();
        assert!(matches!(err, ConveyorError::StepExecution { .. }));
    }
}
