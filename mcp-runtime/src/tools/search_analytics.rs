use chrono::NaiveDate;
use serde_json::{Map, Value, json};

use crate::date::{DateRange, resolve_date_range, today_utc};
use crate::format::{format_analytics_table, format_number, format_position};
use crate::search_console::{
    AnalyticsRow, ApiDimensionFilter, DimensionFilterGroup, SearchAnalyticsQuery, SearchConsoleApi,
    UpstreamError,
};
use crate::validate::{
    ToolError, check_enum, optional_date, optional_enum, optional_enum_array,
    optional_object_array, optional_u32_in_range, required_string,
};

pub const NAME: &str = "gsc.search_analytics";
pub const DESCRIPTION: &str = "Query Google Search Console search analytics data including clicks, impressions, CTR, and position";

pub const DIMENSIONS: [&str; 5] = ["query", "page", "country", "device", "date"];
pub const FILTER_OPERATORS: [&str; 4] = ["equals", "contains", "notContains", "notEquals"];
pub const SEARCH_TYPES: [&str; 6] = ["web", "image", "video", "news", "discover", "googleNews"];

const MAX_DAYS: u32 = 540;
const MAX_ROW_LIMIT: u32 = 25_000;
const DEFAULT_ROW_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionFilter {
    pub dimension: String,
    pub operator: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchAnalyticsInput {
    pub site_url: String,
    pub days: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub dimensions: Vec<String>,
    pub row_limit: u32,
    pub start_row: u32,
    pub search_type: String,
    pub filters: Vec<DimensionFilter>,
}

pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "siteUrl": {
                "type": "string",
                "description": "GSC property URL (e.g., \"sc-domain:example.com\" or \"https://www.example.com/\")"
            },
            "days": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_DAYS,
                "description": "Number of days to look back from today (e.g., 7, 28, 90). Server calculates dates automatically. Preferred over explicit dates."
            },
            "startDate": {
                "type": "string",
                "pattern": "^\\d{4}-\\d{2}-\\d{2}$",
                "description": "Optional explicit start date (YYYY-MM-DD). Overrides \"days\" if both provided."
            },
            "endDate": {
                "type": "string",
                "pattern": "^\\d{4}-\\d{2}-\\d{2}$",
                "description": "Optional explicit end date (YYYY-MM-DD). Defaults to today."
            },
            "dimensions": {
                "type": "array",
                "items": { "type": "string", "enum": DIMENSIONS },
                "default": ["query"],
                "description": "Dimensions to group by. Default: [\"query\"]"
            },
            "rowLimit": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_ROW_LIMIT,
                "default": DEFAULT_ROW_LIMIT,
                "description": "Maximum rows to return (1-25000). Default: 100"
            },
            "startRow": {
                "type": "integer",
                "minimum": 0,
                "default": 0,
                "description": "Starting row for pagination. Default: 0"
            },
            "searchType": {
                "type": "string",
                "enum": SEARCH_TYPES,
                "default": "web",
                "description": "Type of search results to query. Default: \"web\""
            },
            "filters": {
                "type": "array",
                "description": "Optional filters to apply",
                "items": {
                    "type": "object",
                    "properties": {
                        "dimension": {
                            "type": "string",
                            "enum": DIMENSIONS,
                            "description": "The dimension to filter on"
                        },
                        "operator": {
                            "type": "string",
                            "enum": FILTER_OPERATORS,
                            "description": "The comparison operator"
                        },
                        "expression": {
                            "type": "string",
                            "description": "The value to compare against"
                        }
                    },
                    "required": ["dimension", "operator", "expression"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["siteUrl"],
        "additionalProperties": false
    })
}

pub fn parse(args: &Map<String, Value>) -> Result<SearchAnalyticsInput, ToolError> {
    let filters = optional_object_array(args, "filters")?
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, filter)| parse_filter(i, filter))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SearchAnalyticsInput {
        site_url: required_string(args, "siteUrl")?,
        days: optional_u32_in_range(args, "days", 1, MAX_DAYS)?,
        start_date: optional_date(args, "startDate")?,
        end_date: optional_date(args, "endDate")?,
        dimensions: optional_enum_array(args, "dimensions", &DIMENSIONS)?
            .filter(|dims| !dims.is_empty())
            .unwrap_or_else(|| vec!["query".to_string()]),
        row_limit: optional_u32_in_range(args, "rowLimit", 1, MAX_ROW_LIMIT)?
            .unwrap_or(DEFAULT_ROW_LIMIT),
        start_row: optional_u32_in_range(args, "startRow", 0, u32::MAX)?.unwrap_or(0),
        search_type: optional_enum(args, "searchType", &SEARCH_TYPES)?
            .unwrap_or_else(|| "web".to_string()),
        filters,
    })
}

fn parse_filter(index: usize, filter: &Map<String, Value>) -> Result<DimensionFilter, ToolError> {
    let field = |name: &str| format!("filters[{index}].{name}");
    let string_at = |name: &str| -> Result<String, ToolError> {
        match filter.get(name) {
            Some(Value::String(v)) => Ok(v.clone()),
            Some(_) => Err(ToolError::invalid(
                &field(name),
                format!("'{}' must be a string", field(name)),
            )),
            None => Err(ToolError::invalid(
                &field(name),
                format!("Missing required field '{}'", field(name)),
            )),
        }
    };

    Ok(DimensionFilter {
        dimension: check_enum(&field("dimension"), &string_at("dimension")?, &DIMENSIONS)?,
        operator: check_enum(&field("operator"), &string_at("operator")?, &FILTER_OPERATORS)?,
        expression: string_at("expression")?,
    })
}

/// The upstream request. Property-level aggregation cannot be combined with
/// the `page` dimension.
pub fn build_query(input: &SearchAnalyticsInput, range: &DateRange) -> SearchAnalyticsQuery {
    let has_page_dimension = input
        .dimensions
        .iter()
        .any(|d| d.eq_ignore_ascii_case("page"));

    let dimension_filter_groups = (!input.filters.is_empty()).then(|| {
        vec![DimensionFilterGroup {
            group_type: "and".to_string(),
            filters: input
                .filters
                .iter()
                .map(|f| ApiDimensionFilter {
                    dimension: f.dimension.to_ascii_uppercase(),
                    operator: f.operator.clone(),
                    expression: f.expression.clone(),
                })
                .collect(),
        }]
    });

    SearchAnalyticsQuery {
        start_date: range.start_date.clone(),
        end_date: range.end_date.clone(),
        dimensions: input
            .dimensions
            .iter()
            .map(|d| d.to_ascii_uppercase())
            .collect(),
        row_limit: input.row_limit,
        start_row: input.start_row,
        search_type: input.search_type.to_ascii_uppercase(),
        dimension_filter_groups,
        data_state: "all".to_string(),
        aggregation_type: (!has_page_dimension).then(|| "byProperty".to_string()),
    }
}

pub async fn run(
    api: &dyn SearchConsoleApi,
    input: &SearchAnalyticsInput,
) -> Result<String, UpstreamError> {
    run_on(api, input, today_utc()).await
}

pub async fn run_on(
    api: &dyn SearchConsoleApi,
    input: &SearchAnalyticsInput,
    today: NaiveDate,
) -> Result<String, UpstreamError> {
    let range = resolve_date_range(
        input.start_date.as_deref(),
        input.end_date.as_deref(),
        input.days,
        today,
    );
    let query = build_query(input, &range);
    let rows = api.query_search_analytics(&input.site_url, &query).await?;
    tracing::debug!(rows = rows.len(), site = %input.site_url, "Search analytics returned");
    Ok(render(input, &range, &rows))
}

pub fn render(input: &SearchAnalyticsInput, range: &DateRange, rows: &[AnalyticsRow]) -> String {
    let mut output = format!(
        "Search Analytics for {}\nPeriod: {} to {}\nDimensions: {}\n",
        input.site_url,
        range.start_date,
        range.end_date,
        input.dimensions.join(", ")
    );
    if !input.filters.is_empty() {
        let filters: Vec<String> = input
            .filters
            .iter()
            .map(|f| format!("{} {} \"{}\"", f.dimension, f.operator, f.expression))
            .collect();
        output.push_str(&format!("Filters: {}\n", filters.join(", ")));
    }
    output.push('\n');
    output.push_str(&format_analytics_table(rows, &input.dimensions));

    if !rows.is_empty() {
        let total_clicks: f64 = rows.iter().map(|r| r.clicks.unwrap_or(0.0)).sum();
        let total_impressions: f64 = rows.iter().map(|r| r.impressions.unwrap_or(0.0)).sum();
        let average_ctr = if total_impressions > 0.0 {
            total_clicks / total_impressions
        } else {
            0.0
        };
        let average_position =
            rows.iter().map(|r| r.position.unwrap_or(0.0)).sum::<f64>() / rows.len() as f64;
        let limit_note = if rows.len() == input.row_limit as usize {
            " (limit reached)"
        } else {
            ""
        };

        output.push_str("\n--- Summary ---\n");
        output.push_str(&format!("Total Clicks: {}\n", format_number(total_clicks)));
        output.push_str(&format!(
            "Total Impressions: {}\n",
            format_number(total_impressions)
        ));
        output.push_str(&format!("Average CTR: {:.2}%\n", average_ctr * 100.0));
        output.push_str(&format!(
            "Average Position: {}\n",
            format_position(average_position)
        ));
        output.push_str(&format!("Rows Returned: {}{limit_note}\n", rows.len()));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn parse_applies_defaults() {
        let input = parse(&args(json!({ "siteUrl": "sc-domain:example.com" }))).unwrap();
        assert_eq!(input.dimensions, vec!["query"]);
        assert_eq!(input.row_limit, 100);
        assert_eq!(input.start_row, 0);
        assert_eq!(input.search_type, "web");
        assert!(input.filters.is_empty());
    }

    #[test]
    fn parse_names_offending_filter_field() {
        let err = parse(&args(json!({
            "siteUrl": "sc-domain:example.com",
            "filters": [{ "dimension": "query", "operator": "startsWith", "expression": "rust" }]
        })))
        .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("filters[0].operator"));
    }

    #[test]
    fn parse_rejects_out_of_range_days() {
        let err = parse(&args(json!({ "siteUrl": "sc-domain:example.com", "days": 541 })))
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("days"));
    }

    #[test]
    fn query_uses_property_aggregation_unless_page_requested() {
        let range = DateRange {
            start_date: "2026-01-01".to_string(),
            end_date: "2026-01-28".to_string(),
        };
        let mut input = parse(&args(json!({
            "siteUrl": "sc-domain:example.com",
            "searchType": "googleNews",
            "filters": [{ "dimension": "country", "operator": "equals", "expression": "deu" }]
        })))
        .unwrap();

        let query = build_query(&input, &range);
        assert_eq!(query.aggregation_type.as_deref(), Some("byProperty"));
        assert_eq!(query.search_type, "GOOGLENEWS");
        assert_eq!(query.data_state, "all");
        let groups = query.dimension_filter_groups.unwrap();
        assert_eq!(groups[0].group_type, "and");
        assert_eq!(groups[0].filters[0].dimension, "COUNTRY");

        input.dimensions = vec!["page".to_string(), "query".to_string()];
        let query = build_query(&input, &range);
        assert_eq!(query.aggregation_type, None);
        assert_eq!(query.dimensions, vec!["PAGE", "QUERY"]);
    }

    #[test]
    fn render_includes_summary_and_limit_note() {
        let input = parse(&args(json!({ "siteUrl": "sc-domain:example.com", "rowLimit": 2 })))
            .unwrap();
        let range = DateRange {
            start_date: "2026-01-01".to_string(),
            end_date: "2026-01-28".to_string(),
        };
        let rows = [
            AnalyticsRow {
                keys: Some(vec!["a".to_string()]),
                clicks: Some(10.0),
                impressions: Some(100.0),
                ctr: Some(0.1),
                position: Some(2.0),
            },
            AnalyticsRow {
                keys: Some(vec!["b".to_string()]),
                clicks: Some(0.0),
                impressions: Some(900.0),
                ctr: Some(0.0),
                position: Some(5.0),
            },
        ];
        let text = render(&input, &range, &rows);
        assert!(text.starts_with("Search Analytics for sc-domain:example.com\nPeriod: 2026-01-01 to 2026-01-28\n"));
        assert!(text.contains("Total Clicks: 10\n"));
        assert!(text.contains("Total Impressions: 1,000\n"));
        assert!(text.contains("Average CTR: 1.00%\n"));
        assert!(text.contains("Average Position: 3.5\n"));
        assert!(text.contains("Rows Returned: 2 (limit reached)\n"));
    }

    #[test]
    fn render_without_rows_has_no_summary() {
        let input = parse(&args(json!({ "siteUrl": "sc-domain:example.com" }))).unwrap();
        let range = DateRange {
            start_date: "2026-01-01".to_string(),
            end_date: "2026-01-28".to_string(),
        };
        let text = render(&input, &range, &[]);
        assert!(text.contains("No data found for the specified criteria."));
        assert!(!text.contains("Summary"));
    }
}
