//! Command-line interface for Conveyor.
//!
//! This module provides the CLI argument parsing using clap's derive macros
//! and command implementations.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{CheckArgs, Cli, Commands, RunArgs, VarsArgs};
pub use commands::{exit_code_for, Command, CommandDispatcher, CommandResult, GlobalOptions};
