//! # Output Formatting
//!
//! - **JSON**: the result shape exactly as the core serializes it, pretty-printed
//! - **Text**: a compact human-readable rendering with colors on terminals
//!
//! Failure results in text mode go to stderr; in JSON mode the failure shape
//! goes to stdout like any other result.

pub mod text;

use anyhow::Result;
use caijia_core::Outcome;
use colored::Colorize;
use is_terminal::IsTerminal;
use serde::Serialize;

/// Output format for command results
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    /// Machine-readable formats keep stderr quiet unless asked otherwise.
    pub const fn is_machine_readable(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Whether stdout is an interactive terminal.
pub fn stdout_is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Print a pipeline result and report whether it was a success.
pub fn emit_outcome<T, F>(outcome: &Outcome<T>, format: OutputFormat, render: F) -> Result<bool>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => match outcome {
            Outcome::Success(payload) => print!("{}", render(payload)),
            Outcome::Failure { error } => eprintln!("{} {error}", "error:".red().bold()),
        },
    }
    Ok(outcome.is_success())
}
