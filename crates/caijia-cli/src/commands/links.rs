//! `caijia links`

use anyhow::{Context, Result};
use caijia_core::PricePipeline;

use crate::output::{OutputFormat, text};

/// Print up to `limit` bulletin links, newest first.
pub async fn execute(pipeline: &PricePipeline, limit: usize, format: OutputFormat) -> Result<bool> {
    let locator = pipeline.locator();
    let mut links = locator
        .ranked_links()
        .await
        .with_context(|| format!("failed to read bulletin index {}", locator.index_url()))?;
    links.truncate(limit);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&links)?),
        OutputFormat::Text if links.is_empty() => {
            println!("No bulletins listed on {}", locator.index_url());
        },
        OutputFormat::Text => print!("{}", text::render_links(&links)),
    }
    Ok(true)
}
