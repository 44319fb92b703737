//! Delegated (service account) access tokens via the JWT-bearer grant.

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::credentials::DelegatedCredential;
use crate::error::AuthError;
use crate::provider::WEBMASTERS_SCOPE;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN_MILLIS: i64 = 60_000;

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    iss: String,
    sub: String,
    aud: String,
    iat: i64,
    exp: i64,
    scope: String,
}

#[derive(Debug, Deserialize)]
struct GrantResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedAccessToken {
    token: String,
    expires_at: i64,
}

/// Mints access tokens for one service account and caches them until shortly
/// before expiry. Concurrent callers share a single grant request.
pub struct DelegatedTokenSource {
    credential: DelegatedCredential,
    http: reqwest::Client,
    scope: String,
    cache: Mutex<Option<CachedAccessToken>>,
}

impl DelegatedTokenSource {
    pub fn new(credential: DelegatedCredential, http: reqwest::Client) -> Self {
        Self {
            credential,
            http,
            scope: WEBMASTERS_SCOPE.to_string(),
            cache: Mutex::new(None),
        }
    }

    pub async fn access_token_at(&self, now_millis: i64) -> Result<String, AuthError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && cached.expires_at - EXPIRY_MARGIN_MILLIS > now_millis
        {
            tracing::debug!("Using cached service account token");
            return Ok(cached.token.clone());
        }

        let assertion = self.signed_assertion(now_millis / 1000)?;
        let response = self
            .http
            .post(&self.credential.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await
            .map_err(|e| AuthError::DelegatedGrant(format!("failed to reach token endpoint: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::DelegatedGrant(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let grant: GrantResponse = response
            .json()
            .await
            .map_err(|e| AuthError::DelegatedGrant(format!("invalid token response: {e}")))?;
        let expires_in = grant.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);

        tracing::info!(
            client_email = %self.credential.client_email,
            expires_in,
            "Service account token obtained"
        );

        *cache = Some(CachedAccessToken {
            token: grant.access_token.clone(),
            expires_at: now_millis + expires_in.saturating_mul(1000),
        });
        Ok(grant.access_token)
    }

    fn signed_assertion(&self, now_secs: i64) -> Result<String, AuthError> {
        let claims = JwtClaims {
            iss: self.credential.client_email.clone(),
            sub: self.credential.client_email.clone(),
            aud: self.credential.token_uri.clone(),
            iat: now_secs,
            exp: now_secs + ASSERTION_LIFETIME_SECS,
            scope: self.scope.clone(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.credential.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.credential.private_key.as_bytes())
            .map_err(|e| AuthError::DelegatedGrant(format!("invalid private key: {e}")))?;
        encode(&header, &claims, &key)
            .map_err(|e| AuthError::DelegatedGrant(format!("failed to sign assertion: {e}")))
    }
}
