//! Pub/sub - fan-out of pipeline events to every server instance.
//!
//! A [`Hub`] wraps one [`Broker`] connection for the lifetime of the process.
//! Publishers encode events and hand them to the broker; each call to
//! [`Hub::subscribe`] gets its own broker-level subscription and a background
//! pump that decodes incoming messages into a private [`Subscription`].

/// Broker client contract.
pub mod broker;
/// Hub configuration.
pub mod config;
/// Broker-backed hub and subscription pump.
pub mod hub;
/// In-process broker (single instance deployments, tests).
pub mod memory;
/// Redis broker.
pub mod redis_broker;
/// Per-caller subscription streams.
pub mod subscription;

pub use broker::{Broker, BrokerSubscription};
pub use config::{HubConfig, DEFAULT_BUFFER_SIZE, DEFAULT_CHANNEL, DEFAULT_QUERY_TIMEOUT};
pub use hub::Hub;
pub use memory::MemoryBroker;
pub use redis_broker::{RedisBroker, RedisHub};
pub use subscription::Subscription;

use crate::error::Result;
use crate::message::Message;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Pub/sub capability for [`Message`] envelopes.
///
/// Object-safe so the orchestrator can hold an `Arc<dyn Pubsub>` without
/// knowing which broker backs it.
#[async_trait]
pub trait Pubsub: Send + Sync {
    /// Publish a message to every subscriber.
    async fn publish(&self, message: &Message) -> Result<()>;

    /// Subscribe until `cancel` fires or the subscription fails.
    fn subscribe(&self, cancel: CancellationToken) -> Subscription<Message>;

    /// Number of subscribers across the deployment.
    async fn subscribers(&self) -> Result<usize>;
}

#[async_trait]
impl<B: Broker> Pubsub for Hub<B> {
    async fn publish(&self, message: &Message) -> Result<()> {
        Hub::publish(self, message).await
    }

    fn subscribe(&self, cancel: CancellationToken) -> Subscription<Message> {
        Hub::subscribe(self, cancel)
    }

    async fn subscribers(&self) -> Result<usize> {
        Hub::subscribers(self).await
    }
}
