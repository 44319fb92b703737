use gsc_core::credentials::resolve_interactive_config;
use gsc_core::{AuthError, AuthSessionProvider, Config, PlannedMode};
use gsc_mcp_runtime::util::{client, to_pretty_json};
use serde_json::{Value, json};

pub async fn status(config: &Config) -> Result<(), AuthError> {
    let now = chrono::Utc::now().timestamp_millis();
    let planned = AuthSessionProvider::new(config, client())
        .plan_at(now)
        .await?;
    println!("{}", to_pretty_json(&status_payload(config, &planned)));
    Ok(())
}

fn status_payload(config: &Config, planned: &PlannedMode) -> Value {
    let client_configured = resolve_interactive_config(config).is_ok();
    let mut payload = match planned {
        PlannedMode::Interactive {
            token_path,
            expired,
        } => json!({
            "mode": "interactive",
            "token_path": token_path.to_string_lossy(),
            "access_token_expired": expired,
        }),
        PlannedMode::Delegated { client_email } => json!({
            "mode": "delegated",
            "client_email": client_email,
        }),
        PlannedMode::Unconfigured => json!({
            "mode": "unconfigured",
            "token_path": config.token_path.to_string_lossy(),
            "hint": "Run `gsc auth` or set GSC_SERVICE_ACCOUNT_PATH",
        }),
    };
    payload["client_credentials_configured"] = Value::Bool(client_configured);
    if let Some(site) = config.default_site() {
        payload["default_site"] = Value::String(site.to_string());
    }
    payload
}
