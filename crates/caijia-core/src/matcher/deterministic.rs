//! Substring matching with a small synonym table.

use super::columns::resolve_name_column;
use crate::table::{Row, Table};
use crate::types::{PriceMatch, RowData};

/// Suffix commonly dropped or added to vegetable names ("青菜" / "青").
const VEGETABLE_SUFFIX: char = '菜';

/// Extra names for items bulletins list under another label.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("西红柿", &["番茄"]),
    ("土豆", &["马铃薯"]),
    ("茄子", &["茄"]),
    ("胡萝卜", &["萝卜", "胡萝"]),
    ("青椒", &["辣椒", "菜椒"]),
];

/// Names a row may carry for the requested item.
///
/// The item itself, the item with its `菜` suffix toggled, and any
/// registered synonyms. Empty variants are dropped so that a bare `菜`
/// does not match every row.
///
/// ```rust
/// use caijia_core::matcher::search_terms;
///
/// assert_eq!(search_terms("西红柿"), vec!["西红柿", "西红柿菜", "番茄"]);
/// assert_eq!(search_terms("芹菜"), vec!["芹菜", "芹"]);
/// ```
pub fn search_terms(food_item: &str) -> Vec<String> {
    let mut terms = vec![food_item.to_string()];

    match food_item.strip_suffix(VEGETABLE_SUFFIX) {
        Some(stem) => terms.push(stem.to_string()),
        None => terms.push(format!("{food_item}{VEGETABLE_SUFFIX}")),
    }

    if let Some((_, extra)) = SYNONYMS.iter().find(|(name, _)| *name == food_item) {
        terms.extend(extra.iter().map(ToString::to_string));
    }

    terms.retain(|t| !t.is_empty());
    terms
}

/// Turn a data row into a match: name cell plus every other column keyed by header.
///
/// Returns `None` when the row is too short to have a name cell. Columns
/// missing from a short row are left out of `data`.
pub(crate) fn row_to_match(header: &[String], row: &Row, name_column: usize) -> Option<PriceMatch> {
    let name = row.get(name_column)?;
    let data: RowData = header
        .iter()
        .zip(row.iter())
        .enumerate()
        .filter(|(index, _)| *index != name_column)
        .map(|(_, (key, value))| (key.clone(), value.clone()))
        .collect();
    Some(PriceMatch::new(name.clone(), data))
}

/// Every row of every usable table whose name cell contains a search term.
///
/// Results follow table order, then row order. No ranking is applied.
pub fn find_matches(tables: &[Table], food_item: &str) -> Vec<PriceMatch> {
    let terms = search_terms(food_item);
    let mut matches = Vec::new();

    for table in tables.iter().filter(|t| t.is_usable()) {
        let Some(header) = table.header() else {
            continue;
        };
        let Some(name_column) = resolve_name_column(header) else {
            continue;
        };

        for row in table.data_rows() {
            let Some(name) = row.get(name_column) else {
                continue;
            };
            if terms.iter().any(|term| name.contains(term.as_str())) {
                matches.extend(row_to_match(header, row, name_column));
            }
        }
    }

    matches
}
