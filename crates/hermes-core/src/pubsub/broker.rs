use crate::error::Result;
use async_trait::async_trait;

/// Message broker client used by the hub.
///
/// Implementations must be safe for concurrent use: a single broker is shared
/// by every publisher, subscriber and query in the process.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Check that the broker is reachable.
    async fn ping(&self) -> Result<()>;

    /// Hand a payload to the broker for fan-out on `channel`.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()>;

    /// Open a dedicated subscription on `channel`.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn BrokerSubscription>>;

    /// Run an arbitrary command, e.g. `["PUBSUB", "NUMSUB", "hermes-events"]`.
    async fn command(&self, args: &[String]) -> Result<redis::Value>;
}

/// A live broker-level subscription, owned by exactly one pump.
#[async_trait]
pub trait BrokerSubscription: Send {
    /// Check that the subscription's connection is alive.
    async fn ping(&mut self) -> Result<()>;

    /// Wait for the next raw payload.
    ///
    /// Returns `None` once the subscription is closed by the broker. Must be
    /// cancel-safe: dropping the future loses no message.
    async fn next_message(&mut self) -> Option<Vec<u8>>;

    /// Release the subscription. Called exactly once, after the last
    /// `next_message`.
    async fn close(&mut self);
}

#[async_trait]
impl<B: Broker + ?Sized> Broker for std::sync::Arc<B> {
    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        (**self).publish(channel, payload).await
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn BrokerSubscription>> {
        (**self).subscribe(channel).await
    }

    async fn command(&self, args: &[String]) -> Result<redis::Value> {
        (**self).command(args).await
    }
}
