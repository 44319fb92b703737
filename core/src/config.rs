use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TOKEN_PATH: &str = "./token.json";
pub const DEFAULT_OAUTH_PORT: u16 = 3000;
pub const OAUTH_CALLBACK_PATH: &str = "/oauth/callback";
pub const OAUTH_CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Log verbosity accepted by `GSC_LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Unknown or missing values fall back to `info`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("debug") => LogLevel::Debug,
            Some("warn") => LogLevel::Warn,
            Some("error") => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Process-wide configuration, built once at entry and passed down by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub service_account_path: Option<PathBuf>,
    pub token_path: PathBuf,
    pub default_site: Option<String>,
    pub log_level: LogLevel,
    pub oauth_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            service_account_path: None,
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            default_site: None,
            log_level: LogLevel::Info,
            oauth_port: DEFAULT_OAUTH_PORT,
        }
    }
}

impl Config {
    /// Non-empty default site, if configured.
    pub fn default_site(&self) -> Option<&str> {
        self.default_site
            .as_deref()
            .map(str::trim)
            .filter(|site| !site.is_empty())
    }
}
