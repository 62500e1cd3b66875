//! Hermes Core - CI Event Pub/Sub
//!
//! This crate fans build and pipeline lifecycle events out to every server
//! instance of a horizontally-scaled CI deployment, including:
//! - Message: the JSON envelope exchanged between instances
//! - Pub/sub: the broker-backed hub (publish, subscribe, subscriber count)
//! - Brokers: Redis for multi-instance deployments, in-process for single ones

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod pubsub;

pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use message::{decode, encode, BuildStatus, Message, PipelineEvent, Visibility};
pub use pubsub::{
    Broker, BrokerSubscription, Hub, HubConfig, MemoryBroker, Pubsub, RedisBroker, RedisHub,
    Subscription,
};

/// Re-exported so callers can build subscription tokens without a direct
/// `tokio-util` dependency.
pub use tokio_util::sync::CancellationToken;
