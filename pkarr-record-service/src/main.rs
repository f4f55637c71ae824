use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use pkarr_record_service::{ConfigToml, RecordServer};

#[derive(Parser, Debug)]
struct Cli {
    /// [tracing_subscriber::EnvFilter]
    #[clap(short, long)]
    tracing_env_filter: Option<String>,
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[clap(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            args.tracing_env_filter
                .unwrap_or("pkarr_record_service=debug".to_string()),
        )
        .init();

    let config = match args.config {
        Some(path) => ConfigToml::from_file(path)?,
        None => ConfigToml::default(),
    };

    let server = RecordServer::start(config).await?;
    tracing::info!("record service listening on {}", server.http_url());

    server.run_until_done().await;

    Ok(())
}
