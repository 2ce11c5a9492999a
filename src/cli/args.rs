//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Conveyor - run a pipeline definition on this machine.
#[derive(Debug, Parser)]
#[command(name = "conveyor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to agent config file (overrides default .conveyor/agent.yml)
    #[arg(short, long, global = true, env = "CONVEYOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Working directory steps run in (overrides current directory)
    #[arg(short = 'C', long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a pipeline
    Run(RunArgs),

    /// Validate a pipeline without running it
    Check(CheckArgs),

    /// Show the effective variables for a job
    Vars(VarsArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Pipeline file
    pub file: PathBuf,

    /// Set a pipeline variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub vars: Vec<(String, String)>,

    /// Register a secret value to mask (repeatable)
    #[arg(long = "secret", value_name = "VALUE")]
    pub secrets: Vec<String>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Log what steps would run without running them
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CheckArgs {
    /// Pipeline file
    pub file: PathBuf,

    /// Print diagnostics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `vars` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct VarsArgs {
    /// Pipeline file
    pub file: PathBuf,

    /// Stage to scope to (defaults to the first stage)
    #[arg(long)]
    pub stage: Option<String>,

    /// Job to scope to (defaults to the first job of the stage)
    #[arg(long)]
    pub job: Option<String>,

    /// Set a pipeline variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub vars: Vec<(String, String)>,

    /// Leave host environment variables out
    #[arg(long)]
    pub no_host_env: bool,
}

/// Parse a `NAME=VALUE` pair. The value may be empty or contain `=`.
pub fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}
