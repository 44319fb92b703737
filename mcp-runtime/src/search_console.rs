//! Search Console REST client and the response types the tools render.

use std::sync::Arc;

use async_trait::async_trait;
use gsc_core::{AuthError, AuthSession};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const SEARCH_CONSOLE_BASE_URL: &str = "https://searchconsole.googleapis.com";

/// Failure of a single upstream call. `Api` carries the HTTP status so the
/// user-facing mapping is a plain match.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Failed to reach Google Search Console: {0}")]
    Transport(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteEntry {
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub permission_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAnalyticsQuery {
    pub start_date: String,
    pub end_date: String,
    pub dimensions: Vec<String>,
    pub row_limit: u32,
    pub start_row: u32,
    #[serde(rename = "type")]
    pub search_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_filter_groups: Option<Vec<DimensionFilterGroup>>,
    pub data_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionFilterGroup {
    pub group_type: String,
    pub filters: Vec<ApiDimensionFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiDimensionFilter {
    pub dimension: String,
    pub operator: String,
    pub expression: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalyticsRow {
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub clicks: Option<f64>,
    #[serde(default)]
    pub impressions: Option<f64>,
    #[serde(default)]
    pub ctr: Option<f64>,
    #[serde(default)]
    pub position: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlInspectionResponse {
    #[serde(default)]
    pub inspection_result: Option<InspectionResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionResult {
    #[serde(default)]
    pub index_status_result: Option<IndexStatusResult>,
    #[serde(default)]
    pub mobile_usability_result: Option<MobileUsabilityResult>,
    #[serde(default)]
    pub rich_results_result: Option<RichResultsResult>,
    #[serde(default)]
    pub amp_result: Option<AmpResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatusResult {
    pub coverage_state: Option<String>,
    pub indexing_state: Option<String>,
    pub last_crawl_time: Option<String>,
    pub page_fetch_state: Option<String>,
    pub google_canonical: Option<String>,
    pub user_canonical: Option<String>,
    pub robots_txt_state: Option<String>,
    pub verdict: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileUsabilityResult {
    pub verdict: Option<String>,
    #[serde(default)]
    pub issues: Vec<MobileUsabilityIssue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileUsabilityIssue {
    pub issue_type: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichResultsResult {
    pub verdict: Option<String>,
    #[serde(default)]
    pub detected_items: Vec<DetectedItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedItem {
    pub rich_result_type: Option<String>,
    #[serde(default)]
    pub items: Vec<RichResultItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichResultItem {
    #[serde(default)]
    pub issues: Vec<ResultIssue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultIssue {
    pub issue_message: Option<String>,
    pub severity: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmpResult {
    pub verdict: Option<String>,
    pub amp_url: Option<String>,
    #[serde(default)]
    pub issues: Vec<ResultIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sitemap {
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub sitemap_type: Option<String>,
    pub last_submitted: Option<String>,
    pub last_downloaded: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub warnings: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub errors: u64,
    #[serde(default)]
    pub contents: Vec<SitemapContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SitemapContent {
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub submitted: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub indexed: u64,
}

/// int64 fields arrive as JSON strings; tolerate numbers and junk too.
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// The upstream operations the tools need.
#[async_trait]
pub trait SearchConsoleApi: Send + Sync {
    async fn list_sites(&self) -> Result<Vec<SiteEntry>, UpstreamError>;

    async fn query_search_analytics(
        &self,
        site_url: &str,
        query: &SearchAnalyticsQuery,
    ) -> Result<Vec<AnalyticsRow>, UpstreamError>;

    async fn inspect_url(
        &self,
        site_url: &str,
        inspection_url: &str,
    ) -> Result<UrlInspectionResponse, UpstreamError>;

    async fn list_sitemaps(&self, site_url: &str) -> Result<Vec<Sitemap>, UpstreamError>;

    async fn submit_sitemap(&self, site_url: &str, feedpath: &str) -> Result<(), UpstreamError>;

    async fn delete_sitemap(&self, site_url: &str, feedpath: &str) -> Result<(), UpstreamError>;
}

/// Source of bearer tokens for upstream calls.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

#[async_trait]
impl AccessTokenSource for AuthSession {
    async fn access_token(&self) -> Result<String, AuthError> {
        AuthSession::access_token(self).await
    }
}

#[derive(Debug, Deserialize)]
struct SitesListResponse {
    #[serde(default, rename = "siteEntry")]
    site_entry: Vec<SiteEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchAnalyticsResponse {
    #[serde(default)]
    rows: Vec<AnalyticsRow>,
}

#[derive(Debug, Deserialize)]
struct SitemapsListResponse {
    #[serde(default)]
    sitemap: Vec<Sitemap>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

pub struct SearchConsoleClient {
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    base_url: String,
}

impl SearchConsoleClient {
    pub fn new(http: reqwest::Client, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http,
            tokens,
            base_url: SEARCH_CONSOLE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, UpstreamError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| UpstreamError::Transport(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::Transport("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn site_url(&self, site_url: &str, rest: &[&str]) -> Result<reqwest::Url, UpstreamError> {
        let mut segments = vec!["webmasters", "v3", "sites", site_url];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    async fn send(
        &self,
        method: Method,
        url: reqwest::Url,
        body: Option<Value>,
    ) -> Result<Vec<u8>, UpstreamError> {
        let token = self.tokens.access_token().await?;
        tracing::debug!(%method, path = url.path(), "Search Console request");

        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: upstream_message(status, &bytes),
            });
        }
        Ok(bytes.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: reqwest::Url,
        body: Option<Value>,
    ) -> Result<T, UpstreamError> {
        let bytes = self.send(method, url, body).await?;
        let slice: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };
        serde_json::from_slice(slice)
            .map_err(|e| UpstreamError::Transport(format!("unexpected response shape: {e}")))
    }
}

fn upstream_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<GoogleErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                text
            }
        })
}

#[async_trait]
impl SearchConsoleApi for SearchConsoleClient {
    async fn list_sites(&self) -> Result<Vec<SiteEntry>, UpstreamError> {
        let url = self.url(&["webmasters", "v3", "sites"])?;
        let response: SitesListResponse = self.send_json(Method::GET, url, None).await?;
        Ok(response.site_entry)
    }

    async fn query_search_analytics(
        &self,
        site_url: &str,
        query: &SearchAnalyticsQuery,
    ) -> Result<Vec<AnalyticsRow>, UpstreamError> {
        let url = self.site_url(site_url, &["searchAnalytics", "query"])?;
        let body = serde_json::to_value(query)
            .map_err(|e| UpstreamError::Transport(format!("failed to encode query: {e}")))?;
        let response: SearchAnalyticsResponse =
            self.send_json(Method::POST, url, Some(body)).await?;
        Ok(response.rows)
    }

    async fn inspect_url(
        &self,
        site_url: &str,
        inspection_url: &str,
    ) -> Result<UrlInspectionResponse, UpstreamError> {
        let url = self.url(&["v1", "urlInspection", "index:inspect"])?;
        let body = serde_json::json!({
            "inspectionUrl": inspection_url,
            "siteUrl": site_url,
        });
        self.send_json(Method::POST, url, Some(body)).await
    }

    async fn list_sitemaps(&self, site_url: &str) -> Result<Vec<Sitemap>, UpstreamError> {
        let url = self.site_url(site_url, &["sitemaps"])?;
        let response: SitemapsListResponse = self.send_json(Method::GET, url, None).await?;
        Ok(response.sitemap)
    }

    async fn submit_sitemap(&self, site_url: &str, feedpath: &str) -> Result<(), UpstreamError> {
        let url = self.site_url(site_url, &["sitemaps", feedpath])?;
        self.send(Method::PUT, url, None).await.map(|_| ())
    }

    async fn delete_sitemap(&self, site_url: &str, feedpath: &str) -> Result<(), UpstreamError> {
        let url = self.site_url(site_url, &["sitemaps", feedpath])?;
        self.send(Method::DELETE, url, None).await.map(|_| ())
    }
}
