use serde_json::{Map, Value, json};

use crate::format::format_sites_list;
use crate::search_console::{SearchConsoleApi, UpstreamError};
use crate::validate::ToolError;

pub const NAME: &str = "gsc.list_sites";
pub const DESCRIPTION: &str = "List all Google Search Console properties you have access to";

pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "description": "List all GSC properties",
        "properties": {},
        "additionalProperties": false
    })
}

pub fn parse(_args: &Map<String, Value>) -> Result<(), ToolError> {
    Ok(())
}

pub async fn run(api: &dyn SearchConsoleApi) -> Result<String, UpstreamError> {
    let sites = api.list_sites().await?;
    tracing::debug!(count = sites.len(), "Listed Search Console properties");
    Ok(format_sites_list(&sites))
}
