use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of credential resolution, the consent flow and session construction.
///
/// Configuration and session errors are fatal at startup; flow errors are fatal
/// only to the `auth` invocation that produced them.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(
        "Missing Google OAuth credentials. Set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET (see https://console.cloud.google.com/apis/credentials)"
    )]
    MissingCredentials,

    #[error("Service account file not found: {}", .0.display())]
    DelegatedCredentialFileMissing(PathBuf),

    #[error("Failed to parse service account file {}: {reason}", .path.display())]
    DelegatedCredentialMalformed { path: PathBuf, reason: String },

    #[error(
        "No authentication configured. Either run `gsc auth` to create {}, or set GSC_SERVICE_ACCOUNT_PATH to use a service account",
        .token_path.display()
    )]
    NoAuthConfigured { token_path: PathBuf },

    #[error("OAuth error: {0}")]
    OAuthCallback(String),

    #[error("OAuth timeout - no callback received within {} seconds", .0.as_secs())]
    OAuthTimeout(Duration),

    #[error("Token exchange failed: {0}")]
    OAuthExchange(String),

    #[error("Failed to refresh OAuth token ({0}). Run `gsc auth` to re-authenticate.")]
    TokenRefresh(String),

    #[error("Failed to write token file {}: {source}", .path.display())]
    TokenWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("OAuth callback listener failed: {0}")]
    Listener(#[from] std::io::Error),

    #[error("Service account token request failed: {0}")]
    DelegatedGrant(String),
}

impl AuthError {
    /// Machine-readable code, stable across message wording changes.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => codes::MISSING_CREDENTIALS,
            AuthError::DelegatedCredentialFileMissing(_) => codes::DELEGATED_CREDENTIAL_FILE_MISSING,
            AuthError::DelegatedCredentialMalformed { .. } => codes::DELEGATED_CREDENTIAL_MALFORMED,
            AuthError::NoAuthConfigured { .. } => codes::NO_AUTH_CONFIGURED,
            AuthError::OAuthCallback(_) => codes::OAUTH_CALLBACK_ERROR,
            AuthError::OAuthTimeout(_) => codes::OAUTH_TIMEOUT,
            AuthError::OAuthExchange(_) => codes::OAUTH_EXCHANGE_FAILURE,
            AuthError::TokenRefresh(_) => codes::TOKEN_REFRESH_FAILURE,
            AuthError::TokenWrite { .. } => codes::TOKEN_WRITE_FAILURE,
            AuthError::Listener(_) => codes::LISTENER_FAILURE,
            AuthError::DelegatedGrant(_) => codes::DELEGATED_GRANT_FAILURE,
        }
    }
}

/// Error codes surfaced in structured CLI output.
pub mod codes {
    pub const MISSING_CREDENTIALS: &str = "missing_credentials";
    pub const DELEGATED_CREDENTIAL_FILE_MISSING: &str = "delegated_credential_file_missing";
    pub const DELEGATED_CREDENTIAL_MALFORMED: &str = "delegated_credential_malformed";
    pub const NO_AUTH_CONFIGURED: &str = "no_auth_configured";
    pub const OAUTH_CALLBACK_ERROR: &str = "oauth_callback_error";
    pub const OAUTH_TIMEOUT: &str = "oauth_timeout";
    pub const OAUTH_EXCHANGE_FAILURE: &str = "oauth_exchange_failure";
    pub const TOKEN_REFRESH_FAILURE: &str = "token_refresh_failure";
    pub const TOKEN_WRITE_FAILURE: &str = "token_write_failure";
    pub const LISTENER_FAILURE: &str = "listener_failure";
    pub const DELEGATED_GRANT_FAILURE: &str = "delegated_grant_failure";
}
