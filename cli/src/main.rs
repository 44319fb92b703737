use clap::{Parser, Subcommand};
use gsc_core::AuthError;
use gsc_mcp_runtime::ConfigArgs;
use gsc_mcp_runtime::util::{init_tracing, to_pretty_json};
use serde_json::json;

mod commands;

#[derive(Parser)]
#[command(
    name = "gsc",
    version,
    about = "Google Search Console MCP server and credential setup"
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with Google in the browser and store the OAuth token
    Auth,
    /// Delete the stored OAuth token
    Logout,
    /// Show which credential mode the server would use (no network access)
    Status,
    /// Run the MCP server over stdio
    Serve,
}

fn exit_error(code: &str, message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": code,
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", to_pretty_json(&err));
    std::process::exit(1);
}

fn docs_hint(err: &AuthError) -> Option<&'static str> {
    match err {
        AuthError::OAuthTimeout(_) | AuthError::OAuthCallback(_) => {
            Some("Run `gsc auth` again and complete the consent screen in the browser.")
        }
        AuthError::Listener(_) => {
            Some("Another process may be using the callback port. Set GSC_OAUTH_PORT to a free port registered as a redirect URI.")
        }
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = cli.config.into_config();
    init_tracing(config.log_level);

    let result = match cli.command {
        Commands::Auth => commands::auth::login(&config).await,
        Commands::Logout => commands::auth::logout(&config).await,
        Commands::Status => commands::status::status(&config).await,
        Commands::Serve => {
            if let Err(e) = gsc_mcp_runtime::serve(&config).await {
                exit_error(e.code(), &e.to_string(), None);
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        exit_error(e.code(), &e.to_string(), docs_hint(&e));
    }
}
