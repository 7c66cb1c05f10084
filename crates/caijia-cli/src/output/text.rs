//! Text output formatting

use caijia_core::{BulletinLink, BulletinSnapshot, PriceMatch, PriceReport};
use chrono::NaiveDate;
use colored::Colorize;
use std::fmt::Write as _;

const UNDATED: &str = "----------";

fn date_label(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| UNDATED.to_string(), |d| d.format("%Y-%m-%d").to_string())
}

fn row_summary(found: &PriceMatch) -> String {
    found
        .data
        .iter()
        .map(|(column, value)| format!("{}: {value}", column.dimmed()))
        .collect::<Vec<_>>()
        .join(" · ")
}

/// Render a price lookup.
pub fn render_price_report(report: &PriceReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "◆ {} ─ {} ({})",
        report.food_item.bold(),
        report.price_source,
        date_label(report.price_date)
    );
    let _ = writeln!(out, "  {}", report.price_url.bright_black());

    if report.prices.is_empty() {
        let _ = writeln!(out, "  No rows mention '{}' in this bulletin", report.food_item);
        return out;
    }

    if let Some(first) = report.prices.first() {
        if let Some(price) = first.median_price {
            let _ = writeln!(
                out,
                "  Reference price: {} ({})",
                price.to_string().green().bold(),
                first.name
            );
        }
    }

    for (index, found) in report.prices.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}  {}", index + 1, found.name.bold(), row_summary(found));
    }
    out
}

/// Render a bulletin with its tables and recent links.
pub fn render_bulletin(snapshot: &BulletinSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "◆ {} ({})", snapshot.title.bold(), date_label(snapshot.date));
    let _ = writeln!(out, "  {}", snapshot.url.bright_black());

    for (index, table) in snapshot.tables.iter().enumerate() {
        let _ = writeln!(out, "\n  Table {} ({} rows)", index + 1, table.rows().len());
        for (row_index, row) in table.rows().iter().enumerate() {
            let line = row.join(" | ");
            if row_index == 0 {
                let _ = writeln!(out, "    {}", line.bold());
            } else {
                let _ = writeln!(out, "    {line}");
            }
        }
    }

    if !snapshot.all_links.is_empty() {
        let _ = writeln!(out, "\n  Recent bulletins:");
        out.push_str(&render_links(&snapshot.all_links));
    }
    out
}

/// Render bulletin links, one per line with the URL underneath.
pub fn render_links(links: &[BulletinLink]) -> String {
    let mut out = String::new();
    for link in links {
        let _ = writeln!(out, "  {}  {}", date_label(link.date).cyan(), link.title);
        let _ = writeln!(out, "              {}", link.url.bright_black());
    }
    out
}
