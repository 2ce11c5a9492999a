//! Run command implementation.
//!
//! The `conveyor run` command loads a pipeline and executes it.

use std::io::Write;

use tracing::debug;

use crate::cli::args::RunArgs;
use crate::error::Result;
use crate::log::{format_duration, ConsoleLog, LogTheme};
use crate::runner::{PipelineRunContext, RunReport, Scheduler, StatusType};
use crate::steps::StepRegistry;

use super::dispatcher::{
    Command, CommandResult, GlobalOptions, EXIT_CANCELLED, EXIT_FAILURE, EXIT_SUCCESS,
};

/// The run command implementation.
pub struct RunCommand {
    options: GlobalOptions,
    args: RunArgs,
}

impl RunCommand {
    pub fn new(options: GlobalOptions, args: RunArgs) -> Self {
        Self { options, args }
    }

    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    fn summary(&self, report: &RunReport) -> String {
        let theme = if self.options.colors {
            LogTheme::new()
        } else {
            LogTheme::plain()
        };
        let text = if report.cancelled {
            format!("Run cancelled after {}", format_duration(report.duration))
        } else {
            format!(
                "Run finished: {} in {}",
                report.status,
                format_duration(report.duration)
            )
        };
        theme.format_status(report.status, &text)
    }
}

/// Exit code for a finished run.
pub fn exit_code(report: &RunReport) -> i32 {
    if report.cancelled {
        EXIT_CANCELLED
    } else if report.status == StatusType::Error {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

impl Command for RunCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let (pipeline, mut config) = self.options.load(&self.args.file)?;

        for (name, value) in &self.args.vars {
            config = config.with_variable(name.as_str(), value.as_str());
        }
        for secret in &self.args.secrets {
            config = config.with_secret(secret.as_str());
        }
        if self.args.dry_run {
            config = config.with_dry_run(true);
        }

        debug!(file = %self.args.file.display(), stages = pipeline.stages.len(), "Running pipeline");

        // JSON output owns stdout, so progress is reduced to warnings and errors.
        let log = ConsoleLog::new(self.options.quiet || self.args.json, self.options.colors);
        let registry = StepRegistry::with_builtins();
        let mut ctx = PipelineRunContext::new(config, &pipeline).with_log(Box::new(log));

        let report = Scheduler::new(&registry).run(&pipeline, &mut ctx);

        if self.args.json {
            let json = serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?;
            let mut masked = ctx.secrets().writer(&mut *out);
            writeln!(masked, "{}", json)?;
            masked.flush()?;
        } else if !self.options.quiet {
            writeln!(out, "{}", self.summary(&report))?;
        }

        let code = exit_code(&report);
        if code == EXIT_SUCCESS {
            Ok(CommandResult::success())
        } else {
            Ok(CommandResult::failure(code))
        }
    }
}
