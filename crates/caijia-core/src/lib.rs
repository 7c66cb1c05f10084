//! # caijia-core
//!
//! Market-price lookup over published price bulletins.
//!
//! A price authority publishes a bulletin page per reporting day and lists
//! them on an index page. This crate finds the newest bulletin, pulls every
//! table out of it, and returns the rows that name a requested food item
//! together with a headline price.
//!
//! ## Architecture
//!
//! - **Locator** ([`locator`]): finds and ranks bulletin links on the index page
//! - **Table extraction** ([`table`]): turns a bulletin page into rows of cell text
//! - **Matching** ([`matcher`]): name-column resolution, substring matching with
//!   synonyms, and optional assisted matching through a completion service
//! - **Pricing** ([`price`]): the headline price of the first match
//! - **Pipeline** ([`pipeline`]): the sequential request flow and its failure shape
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use caijia_core::{Config, PricePipeline};
//!
//! # async fn run() -> caijia_core::Result<()> {
//! let config = Config::load()?;
//! let pipeline = PricePipeline::from_config(&config)?;
//!
//! let result = pipeline.get_food_item_price("西红柿").await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Internal stages return [`Result<T, Error>`]. The pipeline entry points
//! never return an error: they log it and answer with
//! `{"success": false, "error": "..."}` instead.

/// Client for the assisted text-matching service
pub mod assist;
/// Configuration loading and environment overrides
pub mod config;
/// Error types and result aliases
pub mod error;
/// HTTP fetching of index and bulletin pages
pub mod fetcher;
/// Bulletin link discovery and ranking
pub mod locator;
/// Row matching strategies
pub mod matcher;
/// End-to-end request flow
pub mod pipeline;
/// Headline price computation
pub mod price;
/// HTML table extraction
pub mod table;
/// Result and payload types
pub mod types;

// Re-export commonly used types
pub use assist::{ChatCompletionsClient, CompletionService};
pub use config::{AssistConfig, Config, FetchConfig, SourceConfig};
pub use error::{Error, Result};
pub use fetcher::Fetcher;
pub use locator::{BulletinLink, Locator};
pub use pipeline::PricePipeline;
pub use table::{Table, extract_tables};
pub use types::*;
