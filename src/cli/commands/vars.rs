//! Vars command implementation.
//!
//! The `conveyor vars` command prints the variables a job would see, expanded
//! and with secrets masked.

use std::io::Write;

use crate::cli::args::VarsArgs;
use crate::error::{ConveyorError, Result};
use crate::pipeline::{Job, JobSpec, Pipeline, Stage};
use crate::runner::{DependencyNode, PipelineRunContext};

use super::dispatcher::{Command, CommandResult, GlobalOptions};

/// The vars command implementation.
pub struct VarsCommand {
    options: GlobalOptions,
    args: VarsArgs,
}

impl VarsCommand {
    pub fn new(options: GlobalOptions, args: VarsArgs) -> Self {
        Self { options, args }
    }

    /// Pick the stage and job to scope to.
    fn select(&self, pipeline: &Pipeline) -> Result<(Stage, Job)> {
        let stage = match &self.args.stage {
            Some(name) => pipeline
                .stages
                .iter()
                .find(|s| s.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
                .cloned()
                .ok_or_else(|| ConveyorError::InvalidPipeline {
                    message: format!("stage '{}' not found", name),
                })?,
            None => pipeline.stages.first().cloned().unwrap_or_default(),
        };

        let job = match &self.args.job {
            Some(name) => stage
                .jobs
                .iter()
                .find(|j| j.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
                .cloned()
                .ok_or_else(|| ConveyorError::InvalidPipeline {
                    message: format!("job '{}' not found", name),
                })?,
            None => stage
                .jobs
                .first()
                .cloned()
                .unwrap_or_else(|| Job::from(JobSpec::default())),
        };

        Ok((stage, job))
    }
}

impl Command for VarsCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let (pipeline, mut config) = self.options.load(&self.args.file)?;
        for (name, value) in &self.args.vars {
            config = config.with_variable(name.as_str(), value.as_str());
        }
        if self.args.no_host_env {
            config = config.with_host_env(false);
        }

        let (stage, job) = self.select(&pipeline)?;
        let mut ctx = PipelineRunContext::new(config, &pipeline);
        ctx.setup_job_variables(&stage, &job);

        for (name, value) in ctx.variables().sorted() {
            let rendered = ctx.expand(&value.to_string());
            writeln!(out, "{}={}", name, ctx.mask_secrets(&rendered))?;
        }

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const PIPELINE: &str = r#"
variables:
  configuration: Debug
  target: $(configuration)-x64
stages:
  - stage: Build
    variables:
      configuration: Release
    jobs:
      - job: unit
        variables:
          token: hunter2
        steps:
          - script: echo
  - stage: Deploy
    jobs:
      - job: ship
        steps:
          - script: echo
"#;

    fn vars(stage: Option<&str>, job: Option<&str>) -> Result<String> {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("p.yml"), PIPELINE).unwrap();
        fs::create_dir_all(temp.path().join(".conveyor")).unwrap();
        fs::write(
            temp.path().join(".conveyor/agent.yml"),
            "secrets: [hunter2]\n",
        )
        .unwrap();

        let options = GlobalOptions {
            work_dir: temp.path().to_path_buf(),
            ..Default::default()
        };
        let args = VarsArgs {
            file: PathBuf::from("p.yml"),
            stage: stage.map(String::from),
            job: job.map(String::from),
            no_host_env: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        VarsCommand::new(options, args).execute(&mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn first_stage_and_job_by_default() {
        let out = vars(None, None).unwrap();
        assert!(out.contains("configuration=Release\n"));
        assert!(out.contains("target=Release-x64\n"));
        assert!(out.contains("token=********\n"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn scoped_to_named_stage() {
        let out = vars(Some("deploy"), Some("SHIP")).unwrap();
        assert!(out.contains("configuration=Debug\n"));
        assert!(!out.contains("token="));
    }

    #[test]
    fn unknown_stage_is_an_error() {
        assert!(matches!(
            vars(Some("Nope"), None),
            Err(ConveyorError::InvalidPipeline { .. })
        ));
    }
}
