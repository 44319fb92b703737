use std::sync::Arc;

use chrono::{DateTime, Utc};
use gsc_core::credentials::resolve_interactive_config;
use gsc_core::{
    AuthError, Config, FlowSettings, GoogleOAuthProvider, OAuthFlowCoordinator, TokenStore,
};
use gsc_mcp_runtime::util::{client, to_pretty_json};
use serde_json::json;

/// Interactive consent: print and open the consent URL, then wait for the
/// redirect on the local listener.
pub async fn login(config: &Config) -> Result<(), AuthError> {
    let credentials = resolve_interactive_config(config)?;
    let provider = Arc::new(GoogleOAuthProvider::new(credentials, client()));
    let settings = FlowSettings::from_config(config);
    let timeout = settings.timeout;
    let mut coordinator =
        OAuthFlowCoordinator::new(provider, TokenStore::new(&config.token_path), settings);

    let pending = coordinator.start().await?;
    eprintln!("Opening browser for authentication...");
    eprintln!("If the browser doesn't open, visit: {}", pending.consent_url());
    if let Err(e) = open::that(pending.consent_url()) {
        tracing::warn!(error = %e, "Could not open a browser");
    }
    eprintln!(
        "Waiting for the redirect to {} (gives up after {} seconds)...",
        pending.redirect_uri(),
        timeout.as_secs()
    );

    let record = pending.await_result().await?;

    let output = json!({
        "status": "authenticated",
        "expires_at": DateTime::<Utc>::from_timestamp_millis(record.expiry_date),
        "scope": record.scope,
        "token_path": coordinator.token_store().path().to_string_lossy()
    });
    println!("{}", to_pretty_json(&output));
    Ok(())
}

pub async fn logout(config: &Config) -> Result<(), AuthError> {
    let store = TokenStore::new(&config.token_path);
    let removed = store
        .remove()
        .await
        .map_err(|source| AuthError::TokenWrite {
            path: store.path().to_path_buf(),
            source,
        })?;

    let output = json!({
        "status": if removed { "logged_out" } else { "no_token" },
        "token_path": store.path().to_string_lossy()
    });
    println!("{}", to_pretty_json(&output));
    Ok(())
}
