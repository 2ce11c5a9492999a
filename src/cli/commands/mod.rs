//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. This allows:
//! - Single binary with subcommands (`conveyor run`, `conveyor check`)
//! - Shared pipeline and config loading
//! - Consistent global flag handling

pub mod check;
pub mod dispatcher;
pub mod run;
pub mod vars;

pub use dispatcher::{
    exit_code_for, Command, CommandDispatcher, CommandResult, GlobalOptions, EXIT_CANCELLED,
    EXIT_FAILURE, EXIT_LOAD_FAILURE, EXIT_SUCCESS,
};
