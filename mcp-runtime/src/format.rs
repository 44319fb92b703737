//! Plain-text rendering shared by the tools.

use crate::search_console::{AnalyticsRow, SiteEntry};

const DIMENSION_COLUMN_WIDTH: usize = 40;
const METRIC_COLUMN_WIDTHS: [usize; 4] = [10, 12, 8, 10];

/// `1234567.5` -> `1,234,567.5` (at most three fraction digits).
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let negative = value < 0.0;
    let rounded = (value.abs() * 1000.0).round() / 1000.0;
    let integer = rounded.trunc() as u64;
    let fraction = format!("{:.3}", rounded.fract());
    let fraction = fraction
        .trim_start_matches('0')
        .trim_end_matches('0')
        .trim_end_matches('.');

    let digits = integer.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative && (integer > 0 || !fraction.is_empty()) {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}{fraction}")
}

pub fn format_count(value: u64) -> String {
    format_number(value as f64)
}

pub fn format_percent(ratio: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", ratio * 100.0)
}

pub fn format_position(position: f64) -> String {
    format!("{position:.1}")
}

/// Columns padded to `widths`; overlong values are cut and end in `...`.
pub fn table_row<S: AsRef<str>>(columns: &[S], widths: &[usize]) -> String {
    columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let col = col.as_ref();
            let width = widths.get(i).copied().unwrap_or(20);
            let len = col.chars().count();
            if len > width {
                let kept: String = col.chars().take(width.saturating_sub(3)).collect();
                format!("{kept}...")
            } else {
                format!("{col:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn table_separator(widths: &[usize]) -> String {
    widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-")
}

pub fn format_analytics_table(rows: &[AnalyticsRow], dimensions: &[String]) -> String {
    if rows.is_empty() {
        return "No data found for the specified criteria.".to_string();
    }

    let mut headers: Vec<String> = dimensions.to_vec();
    headers.extend(["Clicks", "Impressions", "CTR", "Position"].map(String::from));
    let mut widths = vec![DIMENSION_COLUMN_WIDTH; dimensions.len()];
    widths.extend(METRIC_COLUMN_WIDTHS);

    let mut output = format!("{}\n{}\n", table_row(&headers, &widths), table_separator(&widths));
    for row in rows {
        let mut values = row
            .keys
            .clone()
            .unwrap_or_else(|| vec!["(unknown)".to_string(); dimensions.len()]);
        values.push(format_number(row.clicks.unwrap_or(0.0)));
        values.push(format_number(row.impressions.unwrap_or(0.0)));
        values.push(format_percent(row.ctr.unwrap_or(0.0), 2));
        values.push(format_position(row.position.unwrap_or(0.0)));
        output.push_str(&table_row(&values, &widths));
        output.push('\n');
    }
    output
}

pub fn format_sites_list(sites: &[SiteEntry]) -> String {
    if sites.is_empty() {
        return "No Search Console properties found.".to_string();
    }

    let noun = if sites.len() == 1 { "property" } else { "properties" };
    let widths = [50, 20];
    let mut output = format!("Found {} Search Console {noun}:\n\n", sites.len());
    output.push_str(&table_row(&["Site URL", "Permission"], &widths));
    output.push('\n');
    output.push_str(&table_separator(&widths));
    output.push('\n');
    for site in sites {
        let row = [
            site.site_url.as_deref().unwrap_or(""),
            site.permission_level.as_deref().unwrap_or(""),
        ];
        output.push_str(&table_row(&row, &widths));
        output.push('\n');
    }
    output
}
