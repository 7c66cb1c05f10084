//! Data shapes returned by the pipeline.
//!
//! Everything here is created fresh per request and serialized with
//! camelCase keys, which is the JSON contract the UI layer consumes.

use crate::locator::BulletinLink;
use crate::table::Table;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

/// Column header to cell value, in the table's column order.
pub type RowData = IndexMap<String, String>;

/// One table row that matched the requested food item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceMatch {
    /// Contents of the row's name cell.
    pub name: String,
    /// Every other column of the row keyed by its header.
    pub data: RowData,
    /// Headline price; only ever set on the first match of a result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_price: Option<f64>,
}

impl PriceMatch {
    /// Create a match without a headline price.
    pub fn new(name: impl Into<String>, data: RowData) -> Self {
        Self {
            name: name.into(),
            data,
            median_price: None,
        }
    }
}

/// Successful price lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceReport {
    /// The food item as requested (trimmed).
    pub food_item: String,
    /// Matching rows; empty when the bulletin lists nothing similar.
    pub prices: Vec<PriceMatch>,
    /// Publication date of the bulletin, `YYYY-MM-DD`.
    ///
    /// `null` when the URL's date folder is not a calendar date (`20251399`).
    pub price_date: Option<NaiveDate>,
    /// Bulletin title as shown on the index page.
    pub price_source: String,
    /// Absolute URL of the bulletin.
    pub price_url: String,
}

/// The latest bulletin with all of its tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletinSnapshot {
    /// Bulletin title.
    pub title: String,
    /// Absolute bulletin URL.
    pub url: String,
    /// Publication date, `YYYY-MM-DD`.
    pub date: Option<NaiveDate>,
    /// Every table extracted from the bulletin page.
    pub tables: Vec<Table>,
    /// The most recent bulletin links, newest first.
    pub all_links: Vec<BulletinLink>,
}

/// Either the full success payload or a human-readable error, never both.
///
/// Serializes as `{"success": true, ...payload}` or
/// `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The request succeeded.
    Success(T),
    /// The request failed; the message is meant for end users.
    Failure {
        /// Localized, human-readable message.
        error: String,
    },
}

/// Result of [`crate::PricePipeline::get_food_item_price`].
pub type PriceQueryResult = Outcome<PriceReport>;

/// Result of [`crate::PricePipeline::latest_bulletin`].
pub type BulletinResult = Outcome<BulletinSnapshot>;

impl<T> Outcome<T> {
    /// Build a failure outcome.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// Whether this is the success shape.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The success payload, if any.
    pub const fn payload(&self) -> Option<&T> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    /// The failure message, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error } => Some(error),
        }
    }
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    success: bool,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(payload) => Tagged {
                success: true,
                body: payload,
            }
            .serialize(serializer),
            Self::Failure { error } => Tagged {
                success: false,
                body: &ErrorBody { error },
            }
            .serialize(serializer),
        }
    }
}
