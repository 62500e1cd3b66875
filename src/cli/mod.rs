//! CLI module for Hermes
//!
//! Provides commands:
//! - `publish`: Publish a pipeline event to every instance
//! - `listen`: Stream events from the channel
//! - `subscribers`: Count subscribers across the deployment
//! - `ping`: Check that the broker is reachable

use crate::config::AppConfig;
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use hermes_core::{format_error_for_cli, Broker, Hub, MemoryBroker, RedisBroker, Visibility};
use std::sync::Arc;
use tracing::info;

pub mod listen;
pub mod publish;

/// Hub over whichever broker the configuration selects
pub type AppHub = Hub<Arc<dyn Broker>>;

/// Hermes CI event pub/sub CLI
#[derive(Parser, Debug)]
#[command(name = "hermes")]
#[command(about = "Fan CI pipeline events out to every server instance")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish a message to the channel
    Publish {
        /// Repository slug, e.g. octocat/hello-world
        #[arg(long)]
        repo: String,
        /// Repository visibility
        #[arg(long, value_enum, default_value_t = VisibilityArg::Private)]
        visibility: VisibilityArg,
        /// JSON payload
        data: String,
    },
    /// Print messages from the channel as JSON lines until Ctrl-C
    Listen {
        /// Stop after this many messages
        #[arg(long)]
        count: Option<usize>,
    },
    /// Print the number of subscribers across all instances
    Subscribers,
    /// Check that the broker is reachable
    Ping,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum VisibilityArg {
    Public,
    Internal,
    Private,
}

impl From<VisibilityArg> for Visibility {
    fn from(arg: VisibilityArg) -> Self {
        match arg {
            VisibilityArg::Public => Visibility::Public,
            VisibilityArg::Internal => Visibility::Internal,
            VisibilityArg::Private => Visibility::Private,
        }
    }
}

/// Connect to the configured broker and build the hub
pub async fn connect(config: &AppConfig) -> anyhow::Result<AppHub> {
    let broker: Arc<dyn Broker> = if config.redis.is_memory() {
        info!("Using in-process broker");
        Arc::new(MemoryBroker::default())
    } else {
        let broker = RedisBroker::connect(&config.redis.url)
            .await
            .map_err(cli_error)
            .context("Failed to connect to Redis")?;
        Arc::new(broker)
    };

    Hub::new(broker, config.pubsub.to_hub_config())
        .await
        .map_err(cli_error)
}

/// Render a library error the way the CLI shows it
pub fn cli_error(error: hermes_core::Error) -> anyhow::Error {
    anyhow::anyhow!(format_error_for_cli(&error))
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Publish {
            repo,
            visibility,
            data,
        }) => publish::run(&config, &repo, visibility.into(), &data).await,
        Some(Commands::Listen { count }) => listen::run(&config, count).await,
        Some(Commands::Subscribers) => {
            let hub = connect(&config).await?;
            let count = hub.subscribers().await.map_err(cli_error)?;
            println!("{}", count);
            Ok(())
        }
        Some(Commands::Ping) => {
            let start = std::time::Instant::now();
            let hub = connect(&config).await?;
            println!(
                "PONG channel={} ({} ms)",
                hub.config().channel,
                start.elapsed().as_millis()
            );
            Ok(())
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoggingConfig, PubsubConfig, RedisConfig};

    fn memory_config() -> AppConfig {
        AppConfig {
            redis: RedisConfig {
                url: "memory://".to_string(),
            },
            pubsub: PubsubConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_parse_publish() {
        let cli = Cli::parse_from([
            "hermes",
            "publish",
            "--repo",
            "octocat/hello-world",
            "--visibility",
            "public",
            r#"{"build":1}"#,
        ]);
        match cli.command {
            Some(Commands::Publish {
                repo, visibility, ..
            }) => {
                assert_eq!(repo, "octocat/hello-world");
                assert_eq!(Visibility::from(visibility), Visibility::Public);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_listen_count() {
        let cli = Cli::parse_from(["hermes", "listen", "--count", "3"]);
        assert!(matches!(cli.command, Some(Commands::Listen { count: Some(3) })));
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let hub = connect(&memory_config()).await.unwrap();
        assert_eq!(hub.subscribers().await.unwrap(), 0);
    }
}
