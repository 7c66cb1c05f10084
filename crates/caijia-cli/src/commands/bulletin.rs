//! `caijia bulletin`

use anyhow::Result;
use caijia_core::PricePipeline;

use crate::output::{OutputFormat, emit_outcome, text};

/// Print the latest bulletin with all of its tables.
pub async fn execute(pipeline: &PricePipeline, format: OutputFormat) -> Result<bool> {
    let result = pipeline.latest_bulletin().await;
    emit_outcome(&result, format, text::render_bulletin)
}
