//! # CLI Structure and Argument Parsing
//!
//! ```bash
//! # Today's price of an item
//! caijia price 西红柿
//! caijia price 青菜 --format text
//!
//! # The whole latest bulletin
//! caijia bulletin
//!
//! # Bulletins listed on the index page, newest first
//! caijia links --limit 5
//! ```
//!
//! Results go to stdout; logs go to stderr. The exit code is 0 for a
//! success result and 1 for a failure result.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Main CLI structure for the `caijia` command
#[derive(Parser, Clone, Debug)]
#[command(name = "caijia")]
#[command(version)]
#[command(about = "caijia - market prices from published price bulletins", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, env = "CAIJIA_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Look up the current price of a food item in the latest bulletin
    Price {
        /// Food item to look up (e.g. 西红柿)
        food_item: String,

        /// Skip assisted matching even when an API key is configured
        #[arg(long)]
        no_assist: bool,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Show the latest bulletin with all of its tables
    Bulletin {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// List bulletin links from the index page, newest first
    Links {
        /// Maximum number of links to show
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl Commands {
    /// Output format selected for the command.
    pub const fn format(&self) -> OutputFormat {
        match self {
            Self::Price { format, .. } | Self::Bulletin { format } | Self::Links { format, .. } => {
                *format
            },
        }
    }
}
