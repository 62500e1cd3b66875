//! Hermes - CI Event Pub/Sub
//!
//! CLI entry point for publishing and listening to pipeline events.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = cli::Cli::parse();

    let config = config::load_config()?;
    init_tracing(config.logging.json);

    if !std::path::Path::new(".env").exists() {
        warn!(".env file not found. Copy .env.example to configure Hermes.");
    }
    debug!(channel = %config.pubsub.channel, "Configuration loaded");

    cli::run(cli, config).await
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hermes=info,hermes_core=info".into());

    // Logs go to stderr so `listen` output stays pipeable.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
