use clap::Parser;
use finance_tracker_api::cli::{self, Cli};
use finance_tracker_api::config::AppConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("finance_tracker_api=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    if let Err(e) = cli::run(cli, config).await {
        match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
            _ => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }

    Ok(())
}
