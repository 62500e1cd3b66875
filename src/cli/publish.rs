//! `hermes publish`

use super::{cli_error, connect};
use crate::config::AppConfig;
use anyhow::{Context, Result};
use hermes_core::{Message, Visibility};
use tracing::info;

/// Publish one message built from the command line
pub async fn run(config: &AppConfig, repo: &str, visibility: Visibility, data: &str) -> Result<()> {
    let message = build_message(repo, visibility, data)?;
    let hub = connect(config).await?;

    hub.publish(&message).await.map_err(cli_error)?;

    info!(repository = %repo, channel = %hub.config().channel, "Message published");
    Ok(())
}

fn build_message(repo: &str, visibility: Visibility, data: &str) -> Result<Message> {
    let data: serde_json::Value =
        serde_json::from_str(data).context("Payload must be valid JSON")?;
    Ok(Message::new(repo, visibility, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message() {
        let msg = build_message("a/b", Visibility::Internal, r#"{"build": 3}"#).unwrap();
        assert_eq!(msg.repository, "a/b");
        assert_eq!(msg.data["build"], 3);
    }

    #[test]
    fn test_build_message_rejects_invalid_json() {
        let err = build_message("a/b", Visibility::Public, "{build").unwrap_err();
        assert!(err.to_string().contains("valid JSON"));
    }
}
