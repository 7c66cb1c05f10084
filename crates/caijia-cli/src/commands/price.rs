//! `caijia price`

use anyhow::Result;
use caijia_core::PricePipeline;
use tracing::debug;

use crate::output::{OutputFormat, emit_outcome, text};

/// Look up `food_item` and print the result.
pub async fn execute(pipeline: &PricePipeline, food_item: &str, format: OutputFormat) -> Result<bool> {
    debug!(assisted = pipeline.has_assist(), "Looking up '{}'", food_item);
    let result = pipeline.get_food_item_price(food_item).await;
    emit_outcome(&result, format, text::render_price_report)
}
