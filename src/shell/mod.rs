//! Process execution for step runners.

pub mod command;

pub use command::{
    execute_streaming, interpreter_command, script_extension, CommandOptions, CommandResult,
    OutputLine,
};
