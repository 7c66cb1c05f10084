//! Headline price computation.
//!
//! The headline ("median") price of a lookup is taken from the first
//! matched row only: its numeric cells are collected in column order and the
//! one at index `count / 2` is picked. The values are not sorted first, so
//! this is a positional middle rather than a statistical median. Downstream
//! consumers rely on the exact figure, so keep it that way.

use crate::types::{PriceMatch, RowData};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Leading decimal number of a cell, the way bulletin cells like `3.50元` are read.
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)").unwrap());

/// Read the leading number of a cell, if it starts with one.
///
/// ```rust
/// use caijia_core::price::parse_price;
///
/// assert_eq!(parse_price(" 3.50元/斤"), Some(3.5));
/// assert_eq!(parse_price("暂无"), None);
/// ```
pub fn parse_price(cell: &str) -> Option<f64> {
    let m = LEADING_NUMBER_RE.find(cell.trim())?;
    m.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Numeric cell values of a row in column order.
pub fn numeric_values(data: &RowData) -> Vec<f64> {
    data.values().filter_map(|v| parse_price(v)).collect()
}

/// The value at index `count / 2` of the row's numeric cells, unsorted.
pub fn representative_price(data: &RowData) -> Option<f64> {
    let values = numeric_values(data);
    values.get(values.len() / 2).copied()
}

/// Set the headline price on the first match and clear it everywhere else.
///
/// A price already reported for the first match (by the assisted matcher)
/// is replaced by the computed one; it is kept only when the row has no
/// numeric cell at all.
pub fn attach_headline(matches: &mut [PriceMatch]) {
    let Some((first, rest)) = matches.split_first_mut() else {
        return;
    };
    for other in rest {
        other.median_price = None;
    }

    let computed = representative_price(&first.data);
    if let (Some(reported), Some(computed)) = (first.median_price, computed) {
        if (reported - computed).abs() > f64::EPSILON {
            debug!(
                reported,
                computed, "Reported headline price differs from computed value"
            );
        }
    }
    if computed.is_some() {
        first.median_price = computed;
    }
}
