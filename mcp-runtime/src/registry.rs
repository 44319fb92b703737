use serde_json::{Map, Value, json};

use crate::search_console::{SearchConsoleApi, UpstreamError};
use crate::tools::search_analytics::SearchAnalyticsInput;
use crate::tools::sitemaps::{SiteInput, SitemapInput};
use crate::tools::url_inspection::InspectUrlInput;
use crate::tools::{list_sites, search_analytics, sitemaps, url_inspection};
use crate::validate::ToolError;

/// Validated arguments for one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    ListSites,
    SearchAnalytics(SearchAnalyticsInput),
    InspectUrl(InspectUrlInput),
    ListSitemaps(SiteInput),
    SubmitSitemap(SitemapInput),
    DeleteSitemap(SitemapInput),
}

impl ToolInput {
    pub async fn execute(&self, api: &dyn SearchConsoleApi) -> Result<String, UpstreamError> {
        match self {
            ToolInput::ListSites => list_sites::run(api).await,
            ToolInput::SearchAnalytics(input) => search_analytics::run(api, input).await,
            ToolInput::InspectUrl(input) => url_inspection::run(api, input).await,
            ToolInput::ListSitemaps(input) => sitemaps::list(api, input).await,
            ToolInput::SubmitSitemap(input) => sitemaps::submit(api, input).await,
            ToolInput::DeleteSitemap(input) => sitemaps::delete(api, input).await,
        }
    }
}

type ParseFn = fn(&Map<String, Value>) -> Result<ToolInput, ToolError>;

pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    parse: ParseFn,
}

impl ToolDefinition {
    fn new(
        name: &'static str,
        description: &'static str,
        input_schema: Value,
        parse: ParseFn,
    ) -> Self {
        Self {
            name,
            description,
            input_schema,
            parse,
        }
    }

    pub fn parse(&self, args: &Map<String, Value>) -> Result<ToolInput, ToolError> {
        (self.parse)(args)
    }

    pub fn accepts_property(&self, property: &str) -> bool {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| props.contains_key(property))
    }

    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

/// Fixed, ordered set of tools advertised by the server.
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        let tools = vec![
            ToolDefinition::new(
                list_sites::NAME,
                list_sites::DESCRIPTION,
                list_sites::input_schema(),
                |args| list_sites::parse(args).map(|()| ToolInput::ListSites),
            ),
            ToolDefinition::new(
                search_analytics::NAME,
                search_analytics::DESCRIPTION,
                search_analytics::input_schema(),
                |args| search_analytics::parse(args).map(ToolInput::SearchAnalytics),
            ),
            ToolDefinition::new(
                url_inspection::NAME,
                url_inspection::DESCRIPTION,
                url_inspection::input_schema(),
                |args| url_inspection::parse(args).map(ToolInput::InspectUrl),
            ),
            ToolDefinition::new(
                sitemaps::LIST_NAME,
                sitemaps::LIST_DESCRIPTION,
                sitemaps::list_input_schema(),
                |args| sitemaps::parse_site(args).map(ToolInput::ListSitemaps),
            ),
            ToolDefinition::new(
                sitemaps::SUBMIT_NAME,
                sitemaps::SUBMIT_DESCRIPTION,
                sitemaps::submit_input_schema(),
                |args| sitemaps::parse_sitemap(args).map(ToolInput::SubmitSitemap),
            ),
            ToolDefinition::new(
                sitemaps::DELETE_NAME,
                sitemaps::DELETE_DESCRIPTION,
                sitemaps::delete_input_schema(),
                |args| sitemaps::parse_sitemap(args).map(ToolInput::DeleteSitemap),
            ),
        ];
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.name).collect()
    }

    /// `tools/list` result body.
    pub fn list_payload(&self) -> Value {
        json!({
            "tools": self.tools.iter().map(ToolDefinition::to_value).collect::<Vec<_>>()
        })
    }
}
