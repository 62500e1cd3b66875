use super::broker::{Broker, BrokerSubscription};
use super::config::HubConfig;
use super::hub::Hub;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

/// Hub backed by Redis pub/sub.
pub type RedisHub = Hub<RedisBroker>;

impl RedisHub {
    /// Connect to Redis and build a hub on top of it.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or Redis is not reachable
    pub async fn connect(redis_url: &str, config: HubConfig) -> Result<Self> {
        let broker = RedisBroker::connect(redis_url)
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;
        Hub::new(broker, config).await
    }
}

/// Redis broker
///
/// Publishes, pings and commands share one multiplexed connection, which is
/// safe to use from many tasks at once. Every subscription opens its own
/// pub/sub connection, since a connection in subscribed mode cannot run
/// regular commands.
///
/// # Security
///
/// - Consider enabling Redis AUTH and TLS (`rediss://`) in production
pub struct RedisBroker {
    client: redis::Client,
    conn: redis::aio::MultiplexedConnection,
}

impl RedisBroker {
    /// Open a client and its shared connection
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid or the connection fails
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        let mut conn = self.conn.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        debug!(channel = %channel, receivers, "Published to Redis");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn BrokerSubscription>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        Ok(Box::new(RedisSubscription {
            channel: channel.to_string(),
            pubsub,
        }))
    }

    async fn command(&self, args: &[String]) -> Result<redis::Value> {
        let Some((name, rest)) = args.split_first() else {
            return Err(Error::Transport("empty command".to_string()));
        };

        let mut conn = self.conn.clone();
        let value = redis::cmd(name).arg(rest).query_async(&mut conn).await?;
        Ok(value)
    }
}

struct RedisSubscription {
    channel: String,
    pubsub: redis::aio::PubSub,
}

#[async_trait]
impl BrokerSubscription for RedisSubscription {
    async fn ping(&mut self) -> Result<()> {
        // In subscribed mode the reply is ["pong", ""], not a status string.
        self.pubsub.ping::<redis::Value>().await?;
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Vec<u8>> {
        self.pubsub
            .on_message()
            .next()
            .await
            .map(|msg| msg.get_payload_bytes().to_vec())
    }

    async fn close(&mut self) {
        if let Err(e) = self.pubsub.unsubscribe(&self.channel).await {
            warn!(channel = %self.channel, error = %e, "Redis UNSUBSCRIBE failed");
        }
    }
}

#[cfg(test)]
// Redis tests require a running Redis instance
// Run with: cargo test --features redis-tests
#[cfg(feature = "redis-tests")]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_redis_broker_round_trip() {
        let broker = RedisBroker::connect("redis://127.0.0.1:6379").await.unwrap();
        broker.ping().await.unwrap();

        let mut sub = broker.subscribe("hermes-test:broker").await.unwrap();
        sub.ping().await.unwrap();

        broker
            .publish("hermes-test:broker", b"payload".to_vec())
            .await
            .unwrap();
        assert_eq!(sub.next_message().await.unwrap(), b"payload");

        sub.close().await;
    }
}
