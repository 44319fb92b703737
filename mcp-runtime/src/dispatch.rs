use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::errors::FormattedError;
use crate::registry::ToolRegistry;
use crate::search_console::SearchConsoleApi;

/// Text result of one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub text: String,
    pub is_error: bool,
}

impl ResponseEnvelope {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// `tools/call` result body.
    pub fn to_call_result(&self) -> Value {
        let mut result = json!({
            "content": [{ "type": "text", "text": self.text }]
        });
        if self.is_error {
            result["isError"] = Value::Bool(true);
        }
        result
    }
}

/// Routes a named call to its tool: default site, validation, execution,
/// then error rendering.
pub struct Dispatcher {
    registry: ToolRegistry,
    api: Arc<dyn SearchConsoleApi>,
    default_site: Option<String>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn SearchConsoleApi>, default_site: Option<String>) -> Self {
        Self {
            registry: ToolRegistry::new(),
            api,
            default_site: default_site.filter(|site| !site.trim().is_empty()),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, name: &str, arguments: Option<&Value>) -> ResponseEnvelope {
        let Some(tool) = self.registry.get(name) else {
            tracing::warn!(tool = name, "Unknown tool requested");
            return ResponseEnvelope::ok(format!("Unknown tool: {name}"));
        };

        let mut args = match arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return ResponseEnvelope::error(format!(
                    "Invalid arguments for {name}: arguments must be an object"
                ));
            }
        };

        if let Some(site) = &self.default_site
            && tool.accepts_property("siteUrl")
            && matches!(args.get("siteUrl"), None | Some(Value::Null))
        {
            args.insert("siteUrl".to_string(), Value::String(site.clone()));
        }

        let input = match tool.parse(&args) {
            Ok(input) => input,
            Err(err) => {
                tracing::debug!(tool = name, field = ?err.field, "Tool arguments rejected");
                return ResponseEnvelope::error(format!("Invalid arguments for {name}: {err}"));
            }
        };

        tracing::debug!(tool = name, "Executing tool");
        match input.execute(self.api.as_ref()).await {
            Ok(text) => ResponseEnvelope::ok(text),
            Err(err) => {
                let formatted = FormattedError::from_upstream(&err);
                tracing::error!(tool = name, code = %formatted.code, error = %err, "Tool failed");
                ResponseEnvelope::error(format!("Error executing {name}: {}", formatted.render()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_console::{
        AnalyticsRow, SearchAnalyticsQuery, SiteEntry, Sitemap, UpstreamError,
        UrlInspectionResponse,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeApi {
        calls: AtomicUsize,
        sites: Vec<SiteEntry>,
        fail_with: Option<u16>,
        sitemap_sites: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn record(&self) -> Result<(), UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(status) => Err(UpstreamError::Api {
                    status,
                    message: "The caller does not have permission".to_string(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SearchConsoleApi for FakeApi {
        async fn list_sites(&self) -> Result<Vec<SiteEntry>, UpstreamError> {
            self.record()?;
            Ok(self.sites.clone())
        }

        async fn query_search_analytics(
            &self,
            _site_url: &str,
            _query: &SearchAnalyticsQuery,
        ) -> Result<Vec<AnalyticsRow>, UpstreamError> {
            self.record()?;
            Ok(Vec::new())
        }

        async fn inspect_url(
            &self,
            _site_url: &str,
            _inspection_url: &str,
        ) -> Result<UrlInspectionResponse, UpstreamError> {
            self.record()?;
            Ok(UrlInspectionResponse::default())
        }

        async fn list_sitemaps(&self, site_url: &str) -> Result<Vec<Sitemap>, UpstreamError> {
            self.record()?;
            self.sitemap_sites.lock().unwrap().push(site_url.to_string());
            Ok(Vec::new())
        }

        async fn submit_sitemap(&self, _site_url: &str, _feedpath: &str) -> Result<(), UpstreamError> {
            self.record()
        }

        async fn delete_sitemap(&self, _site_url: &str, _feedpath: &str) -> Result<(), UpstreamError> {
            self.record()
        }
    }

    fn dispatcher(api: Arc<FakeApi>, default_site: Option<&str>) -> Dispatcher {
        Dispatcher::new(api, default_site.map(str::to_string))
    }

    #[tokio::test]
    async fn unknown_tool_is_not_flagged_as_error() {
        let api = Arc::new(FakeApi::default());
        let envelope = dispatcher(api.clone(), None).dispatch("gsc.nope", None).await;
        assert_eq!(envelope, ResponseEnvelope::ok("Unknown tool: gsc.nope"));
        assert_eq!(envelope.to_call_result().get("isError"), None);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_upstream() {
        let api = Arc::new(FakeApi::default());
        let args = json!({ "siteUrl": "sc-domain:example.com", "rowLimit": 0 });
        let envelope = dispatcher(api.clone(), None)
            .dispatch("gsc.search_analytics", Some(&args))
            .await;
        assert!(envelope.is_error);
        assert!(envelope.text.starts_with("Invalid arguments for gsc.search_analytics:"));
        assert!(envelope.text.contains("rowLimit"));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_property_list_is_a_normal_result() {
        let api = Arc::new(FakeApi::default());
        let envelope = dispatcher(api, None).dispatch("gsc.list_sites", None).await;
        assert_eq!(
            envelope,
            ResponseEnvelope::ok("No Search Console properties found.")
        );
    }

    #[tokio::test]
    async fn forbidden_upstream_becomes_error_envelope() {
        let api = Arc::new(FakeApi {
            fail_with: Some(403),
            ..FakeApi::default()
        });
        let args = json!({ "siteUrl": "sc-domain:example.com" });
        let envelope = dispatcher(api, None)
            .dispatch("gsc.list_sitemaps", Some(&args))
            .await;
        assert!(envelope.is_error);
        assert_eq!(
            envelope.text,
            "Error executing gsc.list_sitemaps: Permission denied. Make sure you have access to this Search Console property.\nDetails: The caller does not have permission"
        );
        assert_eq!(envelope.to_call_result()["isError"], true);
    }

    #[tokio::test]
    async fn default_site_fills_missing_or_null_site() {
        let api = Arc::new(FakeApi::default());
        let dispatcher = dispatcher(api.clone(), Some("sc-domain:default.example"));

        let envelope = dispatcher.dispatch("gsc.list_sitemaps", None).await;
        assert_eq!(envelope.text, "No sitemaps found for sc-domain:default.example");

        let args = json!({ "siteUrl": null });
        dispatcher.dispatch("gsc.list_sitemaps", Some(&args)).await;

        let args = json!({ "siteUrl": "sc-domain:explicit.example" });
        dispatcher.dispatch("gsc.list_sitemaps", Some(&args)).await;

        assert_eq!(
            *api.sitemap_sites.lock().unwrap(),
            vec![
                "sc-domain:default.example",
                "sc-domain:default.example",
                "sc-domain:explicit.example",
            ]
        );
    }

    #[tokio::test]
    async fn missing_site_without_default_names_field() {
        let api = Arc::new(FakeApi::default());
        let envelope = dispatcher(api, None).dispatch("gsc.list_sitemaps", None).await;
        assert!(envelope.is_error);
        assert!(envelope.text.contains("siteUrl"));
    }
}
