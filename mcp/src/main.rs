use clap::Parser;
use gsc_mcp_runtime::ConfigArgs;
use gsc_mcp_runtime::util::{init_tracing, to_pretty_json};
use serde_json::json;

#[derive(Parser)]
#[command(
    name = "gsc-mcp",
    version,
    about = "Google Search Console MCP server over stdio"
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = cli.config.into_config();
    init_tracing(config.log_level);

    if let Err(e) = gsc_mcp_runtime::serve(&config).await {
        let err = json!({
            "error": e.code(),
            "message": e.to_string()
        });
        eprintln!("{}", to_pretty_json(&err));
        std::process::exit(1);
    }
}
