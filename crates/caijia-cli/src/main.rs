//! caijia CLI - market prices from published price bulletins
//!
//! This is the main entry point for the caijia command-line interface.
//! Command implementations live in their own modules under `commands`.

use anyhow::{Context, Result};
use caijia_core::{Config, PricePipeline};
use clap::Parser;
use std::process::ExitCode;

mod cli;
mod commands;
mod output;
mod utils;

use cli::{Cli, Commands};
use utils::logging::initialize_logging;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let config = load_config(&cli)?;
    let pipeline = PricePipeline::from_config(&config).context("invalid configuration")?;

    let success = execute_command(cli.command, pipeline).await?;
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}

async fn execute_command(command: Commands, pipeline: PricePipeline) -> Result<bool> {
    match command {
        Commands::Price {
            food_item,
            no_assist,
            format,
        } => {
            let pipeline = if no_assist {
                pipeline.without_assist()
            } else {
                pipeline
            };
            commands::lookup_price(&pipeline, &food_item, format).await
        },

        Commands::Bulletin { format } => commands::show_bulletin(&pipeline, format).await,

        Commands::Links { limit, format } => commands::list_links(&pipeline, limit, format).await,
    }
}
