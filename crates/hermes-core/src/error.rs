//! Error types for hermes-core
//!
//! This module provides the pub/sub error type and user-friendly error formatting.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Event could not be serialized for the wire
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Inbound bytes are not a valid encoded event
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Broker rejected the request, was unreachable, or timed out
    #[error("transport error: {0}")]
    Transport(String),

    /// Broker returned a structurally unexpected reply
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The broker-level subscription ended unexpectedly
    #[error("pubsub channel={channel} closed")]
    ChannelClosed {
        /// Channel the subscription was attached to
        channel: String,
    },

    /// Broker was not reachable when the hub was constructed
    #[error("broker not accessible: {0}")]
    Unavailable(String),

    /// Invalid hub configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Transport("broker did not respond before the deadline".to_string())
    }
}

/// Trait for user-friendly error messages
///
/// Provides human-readable error messages and suggestions for fixing.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Encoding(msg) => format!("📦 Event could not be encoded: {}", msg),
            Error::Decoding(msg) => format!("📦 Event could not be decoded: {}", msg),
            Error::Transport(msg) => format!("🌐 Broker request failed: {}", msg),
            Error::Protocol(msg) => format!("🧩 Unexpected broker reply: {}", msg),
            Error::ChannelClosed { channel } => {
                format!("🔌 Subscription to '{}' was closed by the broker.", channel)
            }
            Error::Unavailable(msg) => format!("🚫 Broker is not reachable: {}", msg),
            Error::Configuration(msg) => format!("⚙️ Configuration error: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Transport(_) | Error::Unavailable(_) => Some(
                "💡 Check that Redis is running and HERMES_REDIS__URL points at it.".to_string(),
            ),
            Error::ChannelClosed { .. } => {
                Some("💡 Subscribe again once the broker connection is back.".to_string())
            }
            Error::Configuration(_) => {
                Some("💡 Check the [pubsub] section in config/default.toml.".to_string())
            }
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_closed_display() {
        let error = Error::ChannelClosed {
            channel: "hermes-events".to_string(),
        };
        assert_eq!(error.to_string(), "pubsub channel=hermes-events closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_transport_error() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();

        assert!(matches!(Error::from(elapsed), Error::Transport(_)));
    }

    #[test]
    fn test_transport_suggestion() {
        let error = Error::Unavailable("connection refused".to_string());

        let msg = error.user_message();
        assert!(msg.contains("connection refused"));

        let suggestion = error.suggestion().unwrap();
        assert!(suggestion.contains("HERMES_REDIS__URL"));
    }

    #[test]
    fn test_format_error_for_cli() {
        let error = Error::Protocol("unexpected response shape".to_string());

        let output = format_error_for_cli(&error);
        assert!(output.contains("unexpected response shape"));
        assert!(!output.contains("💡"));
    }
}
