//! Credentials and session lifecycle for the Search Console MCP server.

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod oauth_flow;
pub mod provider;
pub mod service_account;
pub mod session;
pub mod token_store;

pub use config::{Config, LogLevel};
pub use error::AuthError;
pub use oauth_flow::{FlowSettings, FlowState, OAuthFlowCoordinator, PendingAuthorization};
pub use provider::{GoogleOAuthProvider, OAuthProvider};
pub use session::{AuthMode, AuthSession, AuthSessionProvider, PlannedMode};
pub use token_store::{TokenRecord, TokenStore};
