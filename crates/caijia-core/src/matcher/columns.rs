//! Locating the item-name column of a bulletin table.
//!
//! Column order and labels differ between publications, so the name column
//! is found by keyword with the first column as fallback.

/// Header keywords that mark the item-name column.
pub const NAME_KEYWORDS: [&str; 7] = ["品名", "名称", "商品", "食品", "蔬菜", "水果", "肉类"];

/// Index of the item-name column of a header row.
///
/// Returns the first cell containing a [`NAME_KEYWORDS`] entry, else `0`
/// for a non-empty header, else `None`.
///
/// ```rust
/// use caijia_core::matcher::resolve_name_column;
///
/// let header = ["序号", "商品名称", "单价"].map(String::from);
/// assert_eq!(resolve_name_column(&header), Some(1));
/// assert_eq!(resolve_name_column(&["规格".to_string()]), Some(0));
/// assert_eq!(resolve_name_column(&[]), None);
/// ```
pub fn resolve_name_column(header: &[String]) -> Option<usize> {
    header
        .iter()
        .position(|cell| NAME_KEYWORDS.iter().any(|k| cell.contains(k)))
        .or_else(|| (!header.is_empty()).then_some(0))
}
