use serde_json::{Map, Value, json};

use crate::search_console::{InspectionResult, SearchConsoleApi, UpstreamError};
use crate::validate::{ToolError, required_string, required_url};

pub const NAME: &str = "gsc.inspect_url";
pub const DESCRIPTION: &str =
    "Inspect a URL to check its indexing status, crawl info, and mobile usability in Google Search";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectUrlInput {
    pub site_url: String,
    pub inspection_url: String,
}

pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "siteUrl": {
                "type": "string",
                "description": "GSC property URL (e.g., \"sc-domain:example.com\" or \"https://www.example.com/\")"
            },
            "inspectionUrl": {
                "type": "string",
                "format": "uri",
                "description": "The full URL to inspect (must be within the property)"
            }
        },
        "required": ["siteUrl", "inspectionUrl"],
        "additionalProperties": false
    })
}

pub fn parse(args: &Map<String, Value>) -> Result<InspectUrlInput, ToolError> {
    Ok(InspectUrlInput {
        site_url: required_string(args, "siteUrl")?,
        inspection_url: required_url(args, "inspectionUrl")?,
    })
}

pub async fn run(
    api: &dyn SearchConsoleApi,
    input: &InspectUrlInput,
) -> Result<String, UpstreamError> {
    let response = api.inspect_url(&input.site_url, &input.inspection_url).await?;
    Ok(match response.inspection_result {
        Some(result) => render(&input.inspection_url, &result),
        None => format!("No inspection data available for {}", input.inspection_url),
    })
}

fn line(output: &mut String, label: &str, value: Option<&String>) {
    if let Some(value) = value {
        output.push_str(&format!("{label}: {value}\n"));
    }
}

pub fn render(inspection_url: &str, result: &InspectionResult) -> String {
    let mut output = format!("URL Inspection Report\n{}\n\nURL: {inspection_url}\n\n", "=".repeat(50));

    if let Some(index) = &result.index_status_result {
        output.push_str("## Indexing Status\n");
        output.push_str(&format!(
            "Coverage State: {}\n",
            index.coverage_state.as_deref().unwrap_or("Unknown")
        ));
        output.push_str(&format!(
            "Indexing State: {}\n",
            index.indexing_state.as_deref().unwrap_or("Unknown")
        ));
        line(&mut output, "Last Crawl", index.last_crawl_time.as_ref());
        line(&mut output, "Page Fetch", index.page_fetch_state.as_ref());
        line(&mut output, "Google Canonical", index.google_canonical.as_ref());
        line(&mut output, "User Canonical", index.user_canonical.as_ref());
        line(&mut output, "Robots.txt", index.robots_txt_state.as_ref());
        line(&mut output, "Verdict", index.verdict.as_ref());
        output.push('\n');
    }

    if let Some(mobile) = &result.mobile_usability_result {
        output.push_str("## Mobile Usability\n");
        output.push_str(&format!(
            "Verdict: {}\n",
            mobile.verdict.as_deref().unwrap_or("Unknown")
        ));
        if mobile.issues.is_empty() {
            output.push_str("No mobile usability issues found.\n");
        } else {
            output.push_str("Issues:\n");
            for issue in &mobile.issues {
                output.push_str(&format!(
                    "  - {}: {}\n",
                    issue.issue_type.as_deref().unwrap_or("Unknown"),
                    issue.message.as_deref().unwrap_or("")
                ));
            }
        }
        output.push('\n');
    }

    if let Some(rich) = &result.rich_results_result {
        output.push_str("## Rich Results\n");
        output.push_str(&format!(
            "Verdict: {}\n",
            rich.verdict.as_deref().unwrap_or("Unknown")
        ));
        if !rich.detected_items.is_empty() {
            output.push_str("Detected Items:\n");
            for detected in &rich.detected_items {
                output.push_str(&format!(
                    "  - {}\n",
                    detected.rich_result_type.as_deref().unwrap_or("Unknown")
                ));
                for issue in detected.items.iter().flat_map(|item| &item.issues) {
                    output.push_str(&format!(
                        "      Issue: {} ({})\n",
                        issue.issue_message.as_deref().unwrap_or(""),
                        issue.severity.as_deref().unwrap_or("UNKNOWN")
                    ));
                }
            }
        }
        output.push('\n');
    }

    if let Some(amp) = &result.amp_result {
        output.push_str("## AMP\n");
        output.push_str(&format!(
            "Verdict: {}\n",
            amp.verdict.as_deref().unwrap_or("Unknown")
        ));
        line(&mut output, "AMP URL", amp.amp_url.as_ref());
        if !amp.issues.is_empty() {
            output.push_str("Issues:\n");
            for issue in &amp.issues {
                output.push_str(&format!(
                    "  - {} ({})\n",
                    issue.issue_message.as_deref().unwrap_or(""),
                    issue.severity.as_deref().unwrap_or("UNKNOWN")
                ));
            }
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_console::UrlInspectionResponse;

    #[test]
    fn parse_requires_absolute_inspection_url() {
        let args = json!({ "siteUrl": "sc-domain:example.com", "inspectionUrl": "/blog" });
        let err = parse(args.as_object().unwrap()).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("inspectionUrl"));
    }

    #[test]
    fn report_renders_present_sections_only() {
        let response: UrlInspectionResponse = serde_json::from_value(json!({
            "inspectionResult": {
                "indexStatusResult": {
                    "coverageState": "Submitted and indexed",
                    "lastCrawlTime": "2026-01-12T08:00:00Z",
                    "verdict": "PASS"
                },
                "mobileUsabilityResult": { "verdict": "PASS" },
                "richResultsResult": {
                    "verdict": "FAIL",
                    "detectedItems": [{
                        "richResultType": "FAQ",
                        "items": [{ "issues": [{ "issueMessage": "Missing field", "severity": "ERROR" }] }]
                    }]
                }
            }
        }))
        .unwrap();

        let text = render("https://example.com/a", &response.inspection_result.unwrap());
        assert!(text.starts_with(&format!("URL Inspection Report\n{}\n\nURL: https://example.com/a\n\n", "=".repeat(50))));
        assert!(text.contains("Coverage State: Submitted and indexed\nIndexing State: Unknown\nLast Crawl: 2026-01-12T08:00:00Z\nVerdict: PASS\n"));
        assert!(!text.contains("Page Fetch"));
        assert!(text.contains("No mobile usability issues found."));
        assert!(text.contains("  - FAQ\n      Issue: Missing field (ERROR)\n"));
        assert!(!text.contains("## AMP"));
    }
}
