//! Typed extraction of tool arguments with field-level errors.

use serde_json::{Map, Value};

pub const VALIDATION_FAILED: &str = "validation_failed";

#[derive(Debug, Clone, PartialEq)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
}

impl ToolError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: VALIDATION_FAILED.to_string(),
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ToolError {}

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(ToolError::invalid(
            key,
            format!("Missing required field '{key}'"),
        )),
        Some(Value::String(v)) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Some(Value::String(_)) => Err(ToolError::invalid(key, format!("'{key}' must not be empty"))),
        Some(_) => Err(ToolError::invalid(key, format!("'{key}' must be a string"))),
    }
}

/// Absolute URL with a host, as accepted by the upstream API.
pub fn required_url(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let raw = required_string(args, key)?;
    match url::Url::parse(&raw) {
        Ok(parsed) if parsed.has_host() => Ok(raw),
        _ => Err(ToolError::invalid(key, format!("'{key}' must be a valid URL"))),
    }
}

pub fn optional_u32_in_range(
    args: &Map<String, Value>,
    key: &str,
    min: u32,
    max: u32,
) -> Result<Option<u32>, ToolError> {
    let range_error = || {
        ToolError::invalid(
            key,
            format!("'{key}' must be an integer between {min} and {max}"),
        )
    };
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let value = match (n.as_u64(), n.as_f64()) {
                (Some(v), _) => v,
                (None, Some(f)) if f.fract() == 0.0 && f >= 0.0 => f as u64,
                _ => return Err(range_error()),
            };
            let value = u32::try_from(value).map_err(|_| range_error())?;
            if value < min || value > max {
                return Err(range_error());
            }
            Ok(Some(value))
        }
        Some(_) => Err(range_error()),
    }
}

/// One of `allowed`, exact match.
pub fn optional_enum(
    args: &Map<String, Value>,
    key: &str,
    allowed: &[&str],
) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) => check_enum(key, v, allowed).map(Some),
        Some(_) => Err(ToolError::invalid(key, format!("'{key}' must be a string"))),
    }
}

pub fn optional_enum_array(
    args: &Map<String, Value>,
    key: &str,
    allowed: &[&str],
) -> Result<Option<Vec<String>>, ToolError> {
    let items = match args.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ToolError::invalid(
                key,
                format!("'{key}' must be an array of strings"),
            ));
        }
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let text = item
            .as_str()
            .ok_or_else(|| ToolError::invalid(key, format!("'{key}' items must be strings")))?;
        out.push(check_enum(key, text, allowed)?);
    }
    Ok(Some(out))
}

pub fn check_enum(key: &str, value: &str, allowed: &[&str]) -> Result<String, ToolError> {
    if allowed.contains(&value) {
        Ok(value.to_string())
    } else {
        Err(ToolError::invalid(
            key,
            format!("'{key}' must be one of: {} (got '{value}')", allowed.join(", ")),
        ))
    }
}

/// `YYYY-MM-DD` that is also a real calendar date. An empty string is not
/// treated as absent.
pub fn optional_date(args: &Map<String, Value>, key: &str) -> Result<Option<String>, ToolError> {
    let raw = match args.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(v)) => v.trim().to_string(),
        Some(_) => return Err(ToolError::invalid(key, format!("'{key}' must be a string"))),
    };
    let shaped = raw.len() == 10
        && raw
            .char_indices()
            .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
    if !shaped || chrono::NaiveDate::parse_from_str(&raw, "%Y-%m-%d").is_err() {
        return Err(ToolError::invalid(
            key,
            format!("'{key}' must be a date in YYYY-MM-DD format"),
        ));
    }
    Ok(Some(raw))
}

pub fn optional_object_array<'a>(
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<&'a Map<String, Value>>>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_object().ok_or_else(|| {
                    ToolError::invalid(key, format!("'{key}' items must be objects"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(ToolError::invalid(
            key,
            format!("'{key}' must be an array of objects"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn required_string_reports_field() {
        let err = required_string(&args(json!({})), "siteUrl").unwrap_err();
        assert_eq!(err.field.as_deref(), Some("siteUrl"));
        assert_eq!(err.code, VALIDATION_FAILED);
        assert!(err.message.contains("siteUrl"));

        let err = required_string(&args(json!({ "siteUrl": 5 })), "siteUrl").unwrap_err();
        assert!(err.message.contains("must be a string"));
    }

    #[test]
    fn url_requires_scheme_and_host() {
        let good = args(json!({ "sitemapUrl": "https://example.com/sitemap.xml" }));
        assert!(required_url(&good, "sitemapUrl").is_ok());
        for bad in ["example.com/sitemap.xml", "not a url", "mailto:me@example.com"] {
            let err = required_url(&args(json!({ "sitemapUrl": bad })), "sitemapUrl").unwrap_err();
            assert_eq!(err.field.as_deref(), Some("sitemapUrl"), "{bad}");
        }
    }

    #[test]
    fn integer_bounds_are_inclusive() {
        let check = |v: Value| optional_u32_in_range(&args(json!({ "rowLimit": v })), "rowLimit", 1, 25000);
        assert_eq!(check(json!(1)).unwrap(), Some(1));
        assert_eq!(check(json!(25000)).unwrap(), Some(25000));
        assert_eq!(check(json!(100.0)).unwrap(), Some(100));
        assert!(check(json!(0)).is_err());
        assert!(check(json!(25001)).is_err());
        assert!(check(json!(-1)).is_err());
        assert!(check(json!(2.5)).is_err());
        assert!(check(json!("10")).is_err());
    }

    #[test]
    fn enum_arrays_reject_unknown_members() {
        let allowed = ["query", "page"];
        let ok = optional_enum_array(&args(json!({ "dimensions": ["page"] })), "dimensions", &allowed);
        assert_eq!(ok.unwrap(), Some(vec!["page".to_string()]));

        let err = optional_enum_array(
            &args(json!({ "dimensions": ["query", "browser"] })),
            "dimensions",
            &allowed,
        )
        .unwrap_err();
        assert!(err.message.contains("browser"));
    }

    #[test]
    fn dates_must_be_real_and_well_formed() {
        let check = |v: &str| optional_date(&args(json!({ "startDate": v })), "startDate");
        assert_eq!(check("2026-02-28").unwrap().as_deref(), Some("2026-02-28"));
        assert!(check("2026-02-30").is_err());
        assert!(check("2026-2-3").is_err());
        assert!(check("20260203").is_err());

        for blank in ["", "   "] {
            let err = check(blank).unwrap_err();
            assert_eq!(err.field.as_deref(), Some("startDate"));
            assert!(err.message.contains("YYYY-MM-DD"));
        }
        assert_eq!(optional_date(&args(json!({})), "startDate").unwrap(), None);
        assert_eq!(
            optional_date(&args(json!({ "endDate": null })), "endDate").unwrap(),
            None
        );
    }
}
