//! External tool execution.
//!
//! All decoder and encoder invocations go through [`run_tool`], which
//! captures the full transcript, forwards lines to the job log, and
//! enforces an optional wall-clock limit.

mod command;
mod runner;

pub use command::ToolCommand;
pub use runner::{run_tool, ProcessError, RunOptions, ToolRun};
