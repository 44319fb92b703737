use chrono::DateTime;
use serde_json::{Map, Value, json};

use crate::format::{format_count, table_row, table_separator};
use crate::search_console::{SearchConsoleApi, Sitemap, UpstreamError};
use crate::validate::{ToolError, required_string, required_url};

pub const LIST_NAME: &str = "gsc.list_sitemaps";
pub const LIST_DESCRIPTION: &str = "List all sitemaps submitted to Google Search Console for a site";
pub const SUBMIT_NAME: &str = "gsc.submit_sitemap";
pub const SUBMIT_DESCRIPTION: &str = "Submit a new sitemap to Google Search Console";
pub const DELETE_NAME: &str = "gsc.delete_sitemap";
pub const DELETE_DESCRIPTION: &str = "Delete a sitemap from Google Search Console";

const COLUMN_WIDTHS: [usize; 6] = [50, 12, 12, 16, 10, 10];
const SITE_URL_DESCRIPTION: &str =
    "GSC property URL (e.g., \"sc-domain:example.com\" or \"https://www.example.com/\")";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInput {
    pub site_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapInput {
    pub site_url: String,
    pub sitemap_url: String,
}

pub fn list_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "siteUrl": { "type": "string", "description": SITE_URL_DESCRIPTION }
        },
        "required": ["siteUrl"],
        "additionalProperties": false
    })
}

fn sitemap_input_schema(sitemap_description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "siteUrl": { "type": "string", "description": SITE_URL_DESCRIPTION },
            "sitemapUrl": {
                "type": "string",
                "format": "uri",
                "description": sitemap_description
            }
        },
        "required": ["siteUrl", "sitemapUrl"],
        "additionalProperties": false
    })
}

pub fn submit_input_schema() -> Value {
    sitemap_input_schema("Full URL of the sitemap to submit (e.g., \"https://example.com/sitemap.xml\")")
}

pub fn delete_input_schema() -> Value {
    sitemap_input_schema("Full URL of the sitemap to delete")
}

pub fn parse_site(args: &Map<String, Value>) -> Result<SiteInput, ToolError> {
    Ok(SiteInput {
        site_url: required_string(args, "siteUrl")?,
    })
}

pub fn parse_sitemap(args: &Map<String, Value>) -> Result<SitemapInput, ToolError> {
    Ok(SitemapInput {
        site_url: required_string(args, "siteUrl")?,
        sitemap_url: required_url(args, "sitemapUrl")?,
    })
}

pub async fn list(api: &dyn SearchConsoleApi, input: &SiteInput) -> Result<String, UpstreamError> {
    let sitemaps = api.list_sitemaps(&input.site_url).await?;
    Ok(render_list(&input.site_url, &sitemaps))
}

pub async fn submit(
    api: &dyn SearchConsoleApi,
    input: &SitemapInput,
) -> Result<String, UpstreamError> {
    api.submit_sitemap(&input.site_url, &input.sitemap_url).await?;
    tracing::info!(site = %input.site_url, sitemap = %input.sitemap_url, "Sitemap submitted");
    Ok(format!(
        "Successfully submitted sitemap: {}\n\nThe sitemap has been added to Google Search Console for {}.\nGoogle will process it shortly. Use '{LIST_NAME}' to check the status.",
        input.sitemap_url, input.site_url
    ))
}

pub async fn delete(
    api: &dyn SearchConsoleApi,
    input: &SitemapInput,
) -> Result<String, UpstreamError> {
    api.delete_sitemap(&input.site_url, &input.sitemap_url).await?;
    tracing::info!(site = %input.site_url, sitemap = %input.sitemap_url, "Sitemap deleted");
    Ok(format!(
        "Successfully deleted sitemap: {}\n\nThe sitemap has been removed from Google Search Console for {}.",
        input.sitemap_url, input.site_url
    ))
}

/// RFC 3339 timestamp as a calendar date; unparseable values pass through.
fn display_date(value: Option<&str>) -> String {
    match value {
        None => "N/A".to_string(),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.date_naive().format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| raw.to_string()),
    }
}

pub fn render_list(site_url: &str, sitemaps: &[Sitemap]) -> String {
    if sitemaps.is_empty() {
        return format!("No sitemaps found for {site_url}");
    }

    let mut output = format!(
        "Sitemaps for {site_url}\n{}\n\nFound {} sitemap(s):\n\n",
        "=".repeat(50),
        sitemaps.len()
    );
    let headers = [
        "Sitemap URL",
        "Type",
        "Submitted",
        "Last Downloaded",
        "Warnings",
        "Errors",
    ];
    output.push_str(&table_row(&headers, &COLUMN_WIDTHS));
    output.push('\n');
    output.push_str(&table_separator(&COLUMN_WIDTHS));
    output.push('\n');

    for sitemap in sitemaps {
        let row = [
            sitemap.path.clone().unwrap_or_else(|| "Unknown".to_string()),
            sitemap
                .sitemap_type
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            display_date(sitemap.last_submitted.as_deref()),
            display_date(sitemap.last_downloaded.as_deref()),
            sitemap.warnings.to_string(),
            sitemap.errors.to_string(),
        ];
        output.push_str(&table_row(&row, &COLUMN_WIDTHS));
        output.push('\n');

        for content in &sitemap.contents {
            output.push_str(&format!(
                "    └─ {}: {} submitted, {} indexed\n",
                content.content_type.as_deref().unwrap_or("Unknown"),
                format_count(content.submitted),
                format_count(content.indexed)
            ));
        }
    }

    output
}
