//! Logging initialization and configuration.
//!
//! Logs always go to stderr so stdout carries only the command result.

use anyhow::Result;
use colored::control as color_control;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::cli::Cli;
use crate::output::stdout_is_terminal;

/// Log level implied by the global flags and the selected output format.
///
/// JSON output drops to errors only unless `--verbose` was given.
pub fn level_for(cli: &Cli) -> Level {
    if cli.verbose {
        Level::DEBUG
    } else if cli.quiet || cli.command.format().is_machine_readable() {
        Level::ERROR
    } else {
        Level::WARN
    }
}

/// Initialize the logging subsystem based on CLI flags.
///
/// `RUST_LOG` takes precedence over the flags when it is set.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = level_for(cli);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let env_no_color = std::env::var_os("NO_COLOR").is_some();
    if env_no_color || cli.command.format().is_machine_readable() || !stdout_is_terminal() {
        color_control::set_override(false);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    fn level(args: &[&str]) -> Level {
        level_for(&Cli::try_parse_from(args).unwrap())
    }

    #[test]
    fn test_levels_follow_flags_and_format() {
        assert_eq!(level(&["caijia", "links"]), Level::WARN);
        assert_eq!(level(&["caijia", "price", "青菜"]), Level::ERROR);
        assert_eq!(level(&["caijia", "price", "青菜", "--format", "text"]), Level::WARN);
        assert_eq!(level(&["caijia", "-v", "price", "青菜"]), Level::DEBUG);
        assert_eq!(level(&["caijia", "-q", "links"]), Level::ERROR);
    }
}
