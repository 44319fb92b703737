use gsc_core::LogLevel;
use serde_json::Value;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("gsc-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Install the process-wide subscriber. Output goes to stderr; stdout belongs
/// to the protocol. `RUST_LOG` overrides the configured level.
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn default_directives(level: LogLevel) -> String {
    format!(
        "gsc_core={0},gsc_mcp_runtime={0},gsc_cli={0},gsc_mcp={0},warn",
        level.as_str()
    )
}

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
