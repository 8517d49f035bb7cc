//! CLI module for Strata.
//!
//! Every command loads the configuration itself; `run` is the long-lived
//! one that keeps the wallpaper's clock current.

mod commands;
mod output;

use clap::Parser;
pub use commands::Cli;

use crate::error::StrataError;

/// Runs the CLI.
///
/// Parses command-line arguments and executes the appropriate command.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn run() -> Result<(), StrataError> {
    let cli = Cli::parse();
    cli.execute()
}
