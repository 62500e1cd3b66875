use super::broker::{Broker, BrokerSubscription};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

/// In-process broker built on `tokio::broadcast`.
///
/// Serves single-instance deployments, where every publisher and subscriber
/// lives in the same process, and tests. Each channel is a broadcast channel
/// created on first use. Slow subscribers skip messages (lagged) instead of
/// blocking publishers.
pub struct MemoryBroker {
    channels: RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    capacity: usize,
    available: Arc<AtomicBool>,
}

impl MemoryBroker {
    /// Create a broker whose channels buffer `capacity` messages per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate the broker going away (or coming back). While unavailable,
    /// every call and every subscription ping fails with a transport error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop every channel. Open subscriptions drain what they already
    /// received, then report closed.
    pub async fn disconnect(&self) {
        let mut channels = self.channels.write().await;
        debug!(channels = channels.len(), "Disconnecting in-process broker");
        channels.clear();
    }

    /// Number of live subscriptions on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn check_available(&self) -> Result<()> {
        check(&self.available)
    }

    async fn sender(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        if let Some(sender) = self.channels.read().await.get(channel) {
            return sender.clone();
        }
        self.channels
            .write()
            .await
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(256)
    }
}

fn check(available: &AtomicBool) -> Result<()> {
    if available.load(Ordering::SeqCst) {
        Ok(())
    } else {
        Err(Error::Transport("connection refused".to_string()))
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn ping(&self) -> Result<()> {
        self.check_available()
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        self.check_available()?;
        // send() returns Err if there are no receivers, which is fine
        let delivered = self.sender(channel).await.send(payload).unwrap_or(0);
        debug!(channel = %channel, delivered, "Published to in-process channel");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn BrokerSubscription>> {
        self.check_available()?;
        let receiver = self.sender(channel).await.subscribe();
        Ok(Box::new(MemorySubscription {
            channel: channel.to_string(),
            receiver: Some(receiver),
            available: Arc::clone(&self.available),
        }))
    }

    async fn command(&self, args: &[String]) -> Result<redis::Value> {
        self.check_available()?;

        let upper: Vec<String> = args.iter().take(2).map(|a| a.to_uppercase()).collect();
        if upper != ["PUBSUB", "NUMSUB"] {
            return Err(Error::Transport(format!(
                "ERR unknown command '{}'",
                args.join(" ")
            )));
        }

        let channels = self.channels.read().await;
        let mut reply = Vec::new();
        for channel in &args[2..] {
            let count = channels
                .get(channel)
                .map_or(0, broadcast::Sender::receiver_count);
            reply.push(redis::Value::BulkString(channel.as_bytes().to_vec()));
            reply.push(redis::Value::Int(count as i64));
        }
        Ok(redis::Value::Array(reply))
    }
}

struct MemorySubscription {
    channel: String,
    receiver: Option<broadcast::Receiver<Vec<u8>>>,
    available: Arc<AtomicBool>,
}

#[async_trait]
impl BrokerSubscription for MemorySubscription {
    async fn ping(&mut self) -> Result<()> {
        check(&self.available)
    }

    async fn next_message(&mut self) -> Option<Vec<u8>> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "Subscriber lagged, messages skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn close(&mut self) {
        // Dropping the receiver unsubscribes it.
        self.receiver = None;
    }
}
