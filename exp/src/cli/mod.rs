//! Command-line interface.

mod args;
mod commands;
mod prompt;

pub use args::Cli;
pub use commands::execute;
