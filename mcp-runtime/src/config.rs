use std::path::PathBuf;

use clap::Args;
use gsc_core::config::{DEFAULT_OAUTH_PORT, DEFAULT_TOKEN_PATH};
use gsc_core::{Config, LogLevel};

/// Settings shared by every entry point. Each flag falls back to its
/// environment variable (a `.env` file is loaded before parsing).
#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// OAuth client ID for the interactive flow
    #[arg(long, env = "GOOGLE_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// OAuth client secret for the interactive flow
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Service account key file (enables delegated mode)
    #[arg(long, env = "GSC_SERVICE_ACCOUNT_PATH")]
    pub service_account_path: Option<PathBuf>,

    /// Where the OAuth token is stored
    #[arg(long, env = "GSC_TOKEN_PATH", default_value = DEFAULT_TOKEN_PATH)]
    pub token_path: PathBuf,

    /// Property used when a tool call omits siteUrl
    #[arg(long, env = "GSC_DEFAULT_SITE")]
    pub default_site: Option<String>,

    /// debug, info, warn or error
    #[arg(long, env = "GSC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Local port for the OAuth callback listener
    #[arg(long, env = "GSC_OAUTH_PORT", default_value_t = DEFAULT_OAUTH_PORT)]
    pub oauth_port: u16,
}

impl ConfigArgs {
    pub fn into_config(self) -> Config {
        Config {
            client_id: self.client_id,
            client_secret: self.client_secret,
            service_account_path: self
                .service_account_path
                .filter(|path| !path.as_os_str().is_empty()),
            token_path: self.token_path,
            default_site: self.default_site,
            log_level: LogLevel::parse(self.log_level.as_deref()),
            oauth_port: self.oauth_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    #[test]
    fn explicit_flags_build_config() {
        let cli = TestCli::try_parse_from([
            "gsc",
            "--client-id",
            "id-1",
            "--client-secret",
            "secret-1",
            "--token-path",
            "/tmp/gsc-token.json",
            "--default-site",
            "sc-domain:example.com",
            "--log-level",
            "WARN",
            "--oauth-port",
            "8085",
        ])
        .unwrap();

        let config = cli.config.into_config();
        assert_eq!(config.client_id.as_deref(), Some("id-1"));
        assert_eq!(config.token_path, PathBuf::from("/tmp/gsc-token.json"));
        assert_eq!(config.default_site(), Some("sc-domain:example.com"));
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.oauth_port, 8085);
    }
}
