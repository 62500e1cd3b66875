use crate::error::{Error, Result};
use std::time::Duration;

/// Channel shared by every instance of a deployment.
pub const DEFAULT_CHANNEL: &str = "hermes-events";

/// Default capacity of a subscription's message buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Default timeout for the subscriber-count query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Hub configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Broker channel all events are published to
    pub channel: String,
    /// Capacity of each subscription's message buffer
    pub buffer_size: usize,
    /// Upper bound on a single publish; `None` leaves it to the caller
    pub publish_timeout: Option<Duration>,
    /// Timeout for the subscriber-count query
    pub query_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            publish_timeout: None,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl HubConfig {
    /// Set the channel name
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Set the message buffer capacity
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the publish timeout
    #[must_use]
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = Some(timeout);
        self
    }

    /// Set the subscriber-count query timeout
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an empty channel, a zero buffer or
    /// a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.channel.trim().is_empty() {
            return Err(Error::Configuration("channel must not be empty".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(Error::Configuration(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        if self.query_timeout.is_zero() || self.publish_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::Configuration(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
