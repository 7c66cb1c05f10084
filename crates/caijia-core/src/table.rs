//! Table extraction from bulletin pages.
//!
//! Bulletin pages are hand-edited CMS output and rarely well-formed, so the
//! page is run through an HTML5 tree builder (`scraper`) which repairs
//! unclosed cells and rows the same way a browser would. Extraction never
//! fails: a page without usable tables yields an empty vector.
//!
//! ```rust
//! use caijia_core::table::extract_tables;
//!
//! let html = "<table><tr><th>品名</th><th>价格</th></tr><tr><td>青菜</td><td>2.5</td></tr></table>";
//! let tables = extract_tables(html);
//! assert_eq!(tables.len(), 1);
//! assert_eq!(tables[0].rows()[1], vec!["青菜", "2.5"]);
//! ```

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// One table row: cell texts in column order.
pub type Row = Vec<String>;

/// SAFETY: Selector is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static TABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());

/// SAFETY: Selector is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

/// A table in document order. Row 0 is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    /// Build a table from rows; row 0 is the header.
    pub const fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// All rows including the header.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The header row, if the table has any rows.
    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Rows after the header.
    pub fn data_rows(&self) -> &[Row] {
        self.rows.get(1..).unwrap_or_default()
    }

    /// A table needs a header and at least one data row to be matched against.
    pub fn is_usable(&self) -> bool {
        self.rows.len() >= 2
    }

    /// Copy of this table with the first `count` cells of every row removed.
    #[must_use]
    pub fn without_leading_columns(&self, count: usize) -> Self {
        if count == 0 {
            return self.clone();
        }
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().skip(count).cloned().collect())
            .collect();
        Self { rows }
    }
}

impl From<Vec<Row>> for Table {
    fn from(rows: Vec<Row>) -> Self {
        Self::new(rows)
    }
}

/// Extract every table of an HTML document.
///
/// Tables and rows keep document order. Rows of a nested table belong to
/// the nested table only. A row whose cells are all empty is dropped, and a
/// table left without rows is dropped.
pub fn extract_tables(html: &str) -> Vec<Table> {
    let document = Html::parse_document(html);

    document
        .select(&TABLE_SELECTOR)
        .filter_map(|table| {
            let rows: Vec<Row> = table
                .select(&ROW_SELECTOR)
                .filter(|row| owning_table(*row).is_some_and(|owner| owner.id() == table.id()))
                .map(extract_row)
                .filter(|cells| cells.iter().any(|cell| !cell.is_empty()))
                .collect();
            (!rows.is_empty()).then(|| Table::new(rows))
        })
        .collect()
}

fn owning_table(row: ElementRef<'_>) -> Option<ElementRef<'_>> {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

fn extract_row(row: ElementRef<'_>) -> Row {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .map(cell_text)
        .collect()
}

/// Text of a cell with nested tags stripped, `&nbsp;` removed and whitespace trimmed.
fn cell_text(cell: ElementRef<'_>) -> String {
    let text: String = cell.text().collect();
    text.replace('\u{a0}', "")
        .replace("&nbsp;", "")
        .trim()
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::disallowed_macros, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn rows(table: &Table) -> Vec<Vec<&str>> {
        table
            .rows()
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_extracts_tables_in_document_order() {
        let html = r"
<html><body>
<table><tr><th>品名</th><th>价格</th></tr><tr><td>青菜</td><td>2.5</td></tr></table>
<p>说明</p>
<table><tr><td>猪肉</td><td>28</td></tr></table>
<table><tr><td>鸡蛋</td><td>6.5</td></tr></table>
</body></html>";
        let tables = extract_tables(html);
        assert_eq!(tables.len(), 3);
        assert_eq!(rows(&tables[0]), vec![vec!["品名", "价格"], vec!["青菜", "2.5"]]);
        assert_eq!(rows(&tables[1]), vec![vec!["猪肉", "28"]]);
        assert_eq!(rows(&tables[2]), vec![vec!["鸡蛋", "6.5"]]);
    }

    #[test]
    fn test_strips_nested_tags_and_nbsp() {
        let html = r#"<table><tr>
<td><p><span style="font-size:14px">&nbsp;西红柿&nbsp;</span></p></td>
<td>  <b>3.5</b>
</td></tr></table>"#;
        let tables = extract_tables(html);
        assert_eq!(rows(&tables[0]), vec![vec!["西红柿", "3.5"]]);
    }

    #[test]
    fn test_mixed_th_and_td_cells_keep_order() {
        let html = "<table><tr><th>序号</th><td>品名</td><th>价格</th></tr></table>";
        let tables = extract_tables(html);
        assert_eq!(rows(&tables[0]), vec![vec!["序号", "品名", "价格"]]);
    }

    #[test]
    fn test_drops_rows_without_content_and_empty_tables() {
        let html = r"
<table><tr><td>&nbsp;</td><td> </td></tr><tr><td>萝卜</td><td></td></tr></table>
<table><tr><td>&nbsp;</td></tr></table>
<table></table>";
        let tables = extract_tables(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(rows(&tables[0]), vec![vec!["萝卜", ""]]);
    }

    #[test]
    fn test_tolerates_unclosed_cells_and_rows() {
        let html = "<table><tr><td>土豆<td>2.0<tr><td>茄子<td>4.5</table>";
        let tables = extract_tables(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(rows(&tables[0]), vec![vec!["土豆", "2.0"], vec!["茄子", "4.5"]]);
    }

    #[test]
    fn test_nested_table_rows_are_not_duplicated() {
        let html = r"<table>
<tr><td>外层</td></tr>
<tr><td><table><tr><td>内层</td></tr></table></td></tr>
</table>";
        let tables = extract_tables(html);
        assert_eq!(tables.len(), 2);
        assert_eq!(rows(&tables[0])[0], vec!["外层"]);
        assert_eq!(rows(&tables[1]), vec![vec!["内层"]]);
    }

    #[test]
    fn test_tbody_and_thead_are_transparent() {
        let html = "<table><thead><tr><th>品名</th></tr></thead><tbody><tr><td>芹菜</td></tr></tbody></table>";
        let tables = extract_tables(html);
        assert_eq!(rows(&tables[0]), vec![vec!["品名"], vec!["芹菜"]]);
    }

    #[test]
    fn test_garbage_input_never_panics() {
        for html in ["", "<", "<table", "</table></tr><td>", "<<<>>>", "<table><tr><td>"] {
            let _ = extract_tables(html);
        }
        assert!(extract_tables("plain text").is_empty());
    }

    #[test]
    fn test_table_helpers() {
        let table = Table::new(vec![
            vec!["序号".into(), "品名".into(), "价格".into()],
            vec!["1".into(), "青菜".into(), "2.5".into()],
        ]);
        assert!(table.is_usable());
        assert_eq!(table.header().unwrap()[0], "序号");
        assert_eq!(table.data_rows().len(), 1);

        let trimmed = table.without_leading_columns(1);
        assert_eq!(rows(&trimmed), vec![vec!["品名", "价格"], vec!["青菜", "2.5"]]);
        assert_eq!(table.without_leading_columns(0), table);

        let header_only = Table::new(vec![vec!["品名".into()]]);
        assert!(!header_only.is_usable());
        assert!(header_only.data_rows().is_empty());
        assert!(Table::default().header().is_none());
    }

    #[test]
    fn test_serializes_as_nested_arrays() {
        let table = Table::new(vec![vec!["品名".into()], vec!["青菜".into()]]);
        assert_eq!(serde_json::to_string(&table).unwrap(), r#"[["品名"],["青菜"]]"#);
    }
}
