//! `hermes listen`

use super::{cli_error, connect};
use crate::config::AppConfig;
use anyhow::Result;
use hermes_core::{CancellationToken, Message};
use tracing::{info, warn};

/// Print messages as JSON lines until Ctrl-C, `count` messages, or the
/// subscription fails
pub async fn run(config: &AppConfig, count: Option<usize>) -> Result<()> {
    let hub = connect(config).await?;
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping");
            ctrl_c.cancel();
        }
    });

    let mut sub = hub.subscribe::<Message>(cancel.clone());
    info!(channel = %hub.config().channel, "Listening");

    let mut received = 0usize;
    while let Some(next) = sub.next().await {
        match next {
            Ok(message) => {
                println!("{}", serde_json::to_string(&message)?);
                received += 1;
                if count.is_some_and(|limit| received >= limit) {
                    cancel.cancel();
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Subscription ended");
                return Err(cli_error(e));
            }
        }
    }

    info!(received, "Stopped listening");
    Ok(())
}
