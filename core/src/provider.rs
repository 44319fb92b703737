use async_trait::async_trait;
use serde::Deserialize;

use crate::credentials::{GOOGLE_TOKEN_URI, InteractiveCredentialConfig};
use crate::error::AuthError;
use crate::token_store::TokenRecord;

pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const WEBMASTERS_SCOPE: &str = "https://www.googleapis.com/auth/webmasters";
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Parameters of a single consent redirect.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub redirect_uri: &'a str,
    pub state: &'a str,
    pub code_challenge: &'a str,
}

/// Fields returned by a refresh grant; absent fields keep their stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expiry_date: i64,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl TokenRecord {
    /// Apply a refresh result; the refresh token survives unless a new one is issued.
    pub fn merge_refresh(&mut self, refreshed: RefreshedToken) {
        self.access_token = refreshed.access_token;
        self.expiry_date = refreshed.expiry_date;
        if let Some(refresh_token) = refreshed.refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_token = refresh_token;
        }
        if let Some(token_type) = refreshed.token_type {
            self.token_type = token_type;
        }
        if refreshed.scope.is_some() {
            self.scope = refreshed.scope;
        }
    }
}

/// Identity provider endpoints used by the interactive mode.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> String;

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenRecord, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Google's OAuth 2.0 endpoints for installed applications.
pub struct GoogleOAuthProvider {
    credentials: InteractiveCredentialConfig,
    http: reqwest::Client,
    auth_uri: String,
    token_uri: String,
}

impl GoogleOAuthProvider {
    pub fn new(credentials: InteractiveCredentialConfig, http: reqwest::Client) -> Self {
        Self {
            credentials,
            http,
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
        }
    }

    /// Point at alternative endpoints (useful for testing).
    pub fn with_endpoints(mut self, auth_uri: impl Into<String>, token_uri: impl Into<String>) -> Self {
        self.auth_uri = auth_uri.into();
        self.token_uri = token_uri.into();
        self
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, String> {
        let response = self
            .http
            .post(&self.token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| format!("failed to reach token endpoint: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read token response: {e}"))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{} ({description})", err.error),
                    None => err.error,
                },
                Err(_) => format!("HTTP {}", status.as_u16()),
            });
        }

        serde_json::from_str(&body).map_err(|e| format!("invalid token response: {e}"))
    }
}

fn absolute_expiry(expires_in: Option<i64>) -> i64 {
    chrono::Utc::now().timestamp_millis()
        + expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS).saturating_mul(1000)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[async_trait]
impl OAuthProvider for GoogleOAuthProvider {
    fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> String {
        let mut url = match url::Url::parse(&self.auth_uri) {
            Ok(url) => url,
            Err(_) => return self.auth_uri.clone(),
        };
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("redirect_uri", request.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", WEBMASTERS_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", request.state)
            .append_pair("code_challenge", request.code_challenge)
            .append_pair("code_challenge_method", "S256");
        url.to_string()
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenRecord, AuthError> {
        let response = self
            .post_token_form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", &self.credentials.client_id),
                ("client_secret", &self.credentials.client_secret),
                ("code_verifier", code_verifier),
            ])
            .await
            .map_err(AuthError::OAuthExchange)?;

        let (Some(access_token), Some(refresh_token)) = (
            non_empty(response.access_token),
            non_empty(response.refresh_token),
        ) else {
            return Err(AuthError::OAuthExchange(
                "Failed to obtain tokens from Google".to_string(),
            ));
        };

        Ok(TokenRecord {
            access_token,
            refresh_token,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expiry_date: absolute_expiry(response.expires_in),
            scope: response.scope,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, AuthError> {
        let response = self
            .post_token_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.credentials.client_id),
                ("client_secret", &self.credentials.client_secret),
            ])
            .await
            .map_err(AuthError::TokenRefresh)?;

        let access_token = non_empty(response.access_token).ok_or_else(|| {
            AuthError::TokenRefresh("token endpoint returned no access_token".to_string())
        })?;

        Ok(RefreshedToken {
            access_token,
            expiry_date: absolute_expiry(response.expires_in),
            refresh_token: non_empty(response.refresh_token),
            token_type: response.token_type,
            scope: response.scope,
        })
    }
}
