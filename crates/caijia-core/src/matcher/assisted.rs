//! Semantic matching through a [`CompletionService`].
//!
//! Every candidate row of the bulletin is sent with the query; the service
//! picks the rows that denote the requested item. Only the row names of its
//! answer are trusted: each is resolved back to the bulletin row it names, so
//! cell values and their column order always come from the bulletin. Any
//! failure is reported as [`Error::Assist`] so the caller can fall back to
//! deterministic matching.

use super::columns::resolve_name_column;
use super::deterministic::row_to_match;
use crate::assist::CompletionService;
use crate::price::parse_price;
use crate::table::Table;
use crate::types::{PriceMatch, RowData};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const SYSTEM_PROMPT: &str = "你是一个农产品价格数据助手。你会收到一份从价格公报表格中提取的商品行列表和一个食材名称。\
请找出所有与该食材指的是同一种东西的行（包括别名、俗称和带规格的写法），不要包含无关的商品。\
只返回如下JSON格式：{\"matches\": [{\"name\": \"商品名称\", \"data\": {\"列名\": \"值\"}, \"medianPrice\": 数字}]}。\
name 和 data 必须原样取自输入；没有匹配时返回 {\"matches\": []}。";

#[derive(Serialize)]
struct CandidateRow<'a> {
    name: &'a str,
    data: &'a RowData,
}

#[derive(Deserialize)]
struct MatchEnvelope {
    #[serde(default)]
    matches: Vec<ReportedMatch>,
}

#[derive(Deserialize)]
struct ReportedMatch {
    #[serde(default)]
    name: Value,
    #[serde(default)]
    data: IndexMap<String, Value>,
    #[serde(default, rename = "medianPrice")]
    median_price: Option<Value>,
}

impl ReportedMatch {
    fn into_price_match(self) -> Option<PriceMatch> {
        let name = value_text(&self.name).filter(|n| !n.is_empty())?;
        let data = self
            .data
            .into_iter()
            .filter_map(|(key, value)| value_text(&value).map(|text| (key, text)))
            .collect();
        let median_price = self.median_price.as_ref().and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_price(s),
            _ => None,
        });
        Some(PriceMatch {
            name,
            data,
            median_price,
        })
    }
}

/// Strings stay as they are, numbers and booleans are printed, the rest is dropped.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Every data row of every usable table as an unfiltered match candidate.
pub fn candidate_rows(tables: &[Table]) -> Vec<PriceMatch> {
    tables
        .iter()
        .filter(|t| t.is_usable())
        .filter_map(|table| {
            let header = table.header()?;
            let name_column = resolve_name_column(header)?;
            Some(
                table
                    .data_rows()
                    .iter()
                    .filter_map(move |row| row_to_match(header, row, name_column)),
            )
        })
        .flatten()
        .collect()
}

/// Matcher that delegates the choice of rows to a completion service.
#[derive(Clone)]
pub struct AssistedMatcher {
    service: Arc<dyn CompletionService>,
}

impl AssistedMatcher {
    /// Wrap a completion service.
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Ask the service which rows denote `food_item`.
    ///
    /// Returns `Ok(vec![])` without calling the service when the tables have
    /// no candidate rows. An answer with zero matches is also `Ok(vec![])`.
    pub async fn find_matches(&self, tables: &[Table], food_item: &str) -> Result<Vec<PriceMatch>> {
        let candidates = candidate_rows(tables);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<CandidateRow<'_>> = candidates
            .iter()
            .map(|c| CandidateRow {
                name: &c.name,
                data: &c.data,
            })
            .collect();
        let rows_json = serde_json::to_string(&rows)?;
        let user = format!("食材名称：{food_item}\n商品行：{rows_json}");

        debug!(candidates = candidates.len(), "Requesting assisted match");
        let content = self.service.complete_json(SYSTEM_PROMPT, &user).await?;
        let reported = parse_matches(&content)?;
        Ok(resolve_reported(&reported, &candidates))
    }
}

/// Replace each reported match by the candidate row carrying its name.
///
/// The candidate supplies `data` in bulletin column order; only the reported
/// price is taken from the service. Names that are not a candidate are
/// dropped, and a candidate is used at most once so duplicated answers do not
/// duplicate rows.
fn resolve_reported(reported: &[PriceMatch], candidates: &[PriceMatch]) -> Vec<PriceMatch> {
    let mut taken = vec![false; candidates.len()];
    let resolved: Vec<PriceMatch> = reported
        .iter()
        .filter_map(|found| {
            let (candidate, used) = candidates
                .iter()
                .zip(taken.iter_mut())
                .find(|(c, used)| !**used && c.name.trim() == found.name)?;
            *used = true;
            Some(PriceMatch {
                median_price: found.median_price,
                ..candidate.clone()
            })
        })
        .collect();

    if resolved.len() < reported.len() {
        debug!(
            dropped = reported.len() - resolved.len(),
            "Ignoring reported rows that are not in the bulletin"
        );
    }
    resolved
}

/// Parse the service answer into matches, dropping entries without a name.
pub fn parse_matches(content: &str) -> Result<Vec<PriceMatch>> {
    let envelope: MatchEnvelope = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| Error::Assist(format!("malformed match response: {e}")))?;
    Ok(envelope
        .matches
        .into_iter()
        .filter_map(ReportedMatch::into_price_match)
        .collect())
}

/// Some compatible endpoints wrap JSON in a markdown code fence despite the response format.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim)
}
