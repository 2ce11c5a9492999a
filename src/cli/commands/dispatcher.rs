//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands};
use crate::config::{load_config, AgentConfig};
use crate::error::{ConveyorError, Result};
use crate::log::should_use_colors;
use crate::pipeline::{load_pipeline, Pipeline};

/// Exit code for a run that finished without errors.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a run (or check) that found errors.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code when the pipeline or config could not be loaded.
pub const EXIT_LOAD_FAILURE: i32 = 2;
/// Exit code for a cancelled run.
pub const EXIT_CANCELLED: i32 = 130;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
/// Results meant for the user go to `out`; run progress goes through the
/// run log.
pub trait Command {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: EXIT_SUCCESS,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Exit code for an error that escaped a command.
pub fn exit_code_for(error: &ConveyorError) -> i32 {
    match error {
        ConveyorError::PipelineNotFound { .. }
        | ConveyorError::PipelineParse { .. }
        | ConveyorError::InvalidPipeline { .. }
        | ConveyorError::ConfigParse { .. } => EXIT_LOAD_FAILURE,
        ConveyorError::Cancelled => EXIT_CANCELLED,
        _ => EXIT_FAILURE,
    }
}

/// Global flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub quiet: bool,
    pub colors: bool,
}

impl GlobalOptions {
    /// Build from parsed flags, falling back to the current directory.
    pub fn from_cli(cli: &Cli) -> Self {
        let work_dir = cli
            .work_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            config: cli.config.clone(),
            work_dir,
            quiet: cli.quiet,
            colors: !cli.no_color && should_use_colors(),
        }
    }

    /// Load the pipeline file and the agent config.
    ///
    /// A relative pipeline path is taken from the working directory. The
    /// config's working directory defaults to the global one, and an unnamed
    /// pipeline is named after its file.
    pub fn load(&self, file: &Path) -> Result<(Pipeline, AgentConfig)> {
        let path = if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.work_dir.join(file)
        };
        let pipeline = load_pipeline(&path)?;

        let mut config = load_config(self.config.as_deref(), &self.work_dir)?;
        if config.work_dir.is_none() {
            config.work_dir = Some(self.work_dir.clone());
        }
        if config.definition_name.is_none() && pipeline.name.is_none() {
            config.definition_name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        Ok((pipeline, config))
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    options: GlobalOptions,
}

impl CommandDispatcher {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GlobalOptions {
        &self.options
    }

    /// Route the CLI subcommand to its implementation and execute it.
    pub fn dispatch(&self, cli: &Cli, out: &mut dyn Write) -> Result<CommandResult> {
        match &cli.command {
            Commands::Run(args) => {
                super::run::RunCommand::new(self.options.clone(), args.clone()).execute(out)
            }
            Commands::Check(args) => {
                super::check::CheckCommand::new(self.options.clone(), args.clone()).execute(out)
            }
            Commands::Vars(args) => {
                super::vars::VarsCommand::new(self.options.clone(), args.clone()).execute(out)
            }
        }
    }
}
