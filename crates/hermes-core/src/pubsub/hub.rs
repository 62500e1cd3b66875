use super::broker::{Broker, BrokerSubscription};
use super::config::HubConfig;
use super::subscription::Subscription;
use crate::error::{Error, Result};
use crate::message::{decode, encode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Broker-backed pub/sub hub.
///
/// Cloning is cheap; clones share the broker connection and counters.
pub struct Hub<B: Broker> {
    inner: Arc<HubInner<B>>,
}

struct HubInner<B> {
    broker: B,
    config: HubConfig,
    decode_failures: AtomicU64,
}

impl<B: Broker> Clone for Hub<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Broker> std::fmt::Debug for Hub<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.inner.config)
            .field("decode_failures", &self.decode_failures())
            .finish()
    }
}

impl<B: Broker> Hub<B> {
    /// Create a hub after checking that the broker is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an invalid config and
    /// [`Error::Unavailable`] if the broker does not answer a ping.
    pub async fn new(broker: B, config: HubConfig) -> Result<Self> {
        config.validate()?;

        broker
            .ping()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        info!(channel = %config.channel, buffer_size = config.buffer_size, "Pub/sub hub ready");

        Ok(Self {
            inner: Arc::new(HubInner {
                broker,
                config,
                decode_failures: AtomicU64::new(0),
            }),
        })
    }

    /// The underlying broker.
    #[must_use]
    pub fn broker(&self) -> &B {
        &self.inner.broker
    }

    /// The hub configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Number of inbound messages dropped because they failed to decode.
    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.inner.decode_failures.load(Ordering::Relaxed)
    }

    /// Publish an event to every subscriber of the channel.
    ///
    /// Succeeds once the broker accepts the message; delivery is not
    /// acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] before any network call if the event cannot
    /// be serialized, or [`Error::Transport`] if the broker rejects it or the
    /// publish timeout elapses.
    pub async fn publish<M: Serialize + ?Sized>(&self, event: &M) -> Result<()> {
        let payload = encode(event)?;
        let channel = &self.inner.config.channel;
        let send = self.inner.broker.publish(channel, payload);

        match self.inner.config.publish_timeout {
            Some(timeout) => tokio::time::timeout(timeout, send).await??,
            None => send.await?,
        }

        debug!(channel = %channel, "Event published");
        Ok(())
    }

    /// Subscribe to the channel.
    ///
    /// Returns immediately; a background task opens the broker subscription,
    /// checks it with a ping, then decodes and forwards messages until
    /// `cancel` fires or the broker closes the subscription. A failure is
    /// reported once on the subscription's error stream, after which both
    /// streams close. Dropping the returned [`Subscription`] also stops the
    /// task and releases the broker subscription.
    ///
    /// A full message buffer holds the task back instead of dropping
    /// messages, so the broker absorbs the backlog. Redis buffers it in the
    /// client output buffer; [`MemoryBroker`](super::MemoryBroker) keeps only
    /// its per-channel capacity and a subscriber that falls further behind
    /// skips the oldest messages.
    pub fn subscribe<M>(&self, cancel: CancellationToken) -> Subscription<M>
    where
        M: DeserializeOwned + Send + 'static,
    {
        let (msg_tx, msg_rx) = mpsc::channel(self.inner.config.buffer_size);
        let (err_tx, err_rx) = mpsc::channel(1);

        let pump = Pump {
            inner: Arc::clone(&self.inner),
            messages: msg_tx,
            errors: err_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(pump.run());

        Subscription::new(msg_rx, err_rx, cancel)
    }

    /// Number of subscribers currently attached to the channel, across all
    /// instances.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the broker is unreachable or does not
    /// answer within the query timeout, and [`Error::Protocol`] if the reply
    /// is malformed.
    pub async fn subscribers(&self) -> Result<usize> {
        let channel = &self.inner.config.channel;
        let args = vec![
            "PUBSUB".to_string(),
            "NUMSUB".to_string(),
            channel.clone(),
        ];

        let reply = tokio::time::timeout(
            self.inner.config.query_timeout,
            self.inner.broker.command(&args),
        )
        .await??;

        parse_numsub(&reply)
    }
}

/// Extract the count from a `PUBSUB NUMSUB <channel>` reply.
///
/// The reply must be `[<channel>, <count>]`, or `{<channel>: <count>}` on a
/// RESP3 connection.
pub(crate) fn parse_numsub(reply: &redis::Value) -> Result<usize> {
    let count = match reply {
        redis::Value::Array(values) if values.len() == 2 => &values[1],
        redis::Value::Map(entries) if entries.len() == 1 => &entries[0].1,
        other => {
            return Err(Error::Protocol(format!(
                "unexpected response shape: {:?}",
                other
            )))
        }
    };

    match count {
        redis::Value::Int(n) => usize::try_from(*n)
            .map_err(|_| Error::Protocol(format!("negative number of subscribers: {}", n))),
        redis::Value::BulkString(bytes) => parse_count(&String::from_utf8_lossy(bytes)),
        redis::Value::SimpleString(s) => parse_count(s),
        other => Err(Error::Protocol(format!(
            "unsupported type for number of subscribers: {:?}",
            other
        ))),
    }
}

fn parse_count(raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| Error::Protocol(format!("invalid number of subscribers: {:?}", raw)))
}

/// Background task behind one subscription.
struct Pump<B, M> {
    inner: Arc<HubInner<B>>,
    messages: mpsc::Sender<M>,
    errors: mpsc::Sender<Error>,
    cancel: CancellationToken,
}

impl<B: Broker, M: DeserializeOwned + Send + 'static> Pump<B, M> {
    async fn run(self) {
        let channel = self.inner.config.channel.clone();

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            opened = self.inner.broker.subscribe(&channel) => opened,
        };
        let mut subscription = match opened {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Failed to open subscription");
                let _ = self.errors.send(e).await;
                return;
            }
        };
        debug!(channel = %channel, "Subscription opened");

        let outcome = self.pump(subscription.as_mut(), &channel).await;
        subscription.close().await;
        debug!(channel = %channel, "Subscription closed");

        if let Some(e) = outcome {
            let _ = self.errors.send(e).await;
        }
        // Dropping `self` closes both streams.
    }

    /// Returns the terminal error, or `None` when the caller stopped listening.
    async fn pump(
        &self,
        subscription: &mut dyn BrokerSubscription,
        channel: &str,
    ) -> Option<Error> {
        let pinged = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            _ = self.messages.closed() => {
                debug!(channel = %channel, "Subscriber dropped its receiver");
                return None;
            }
            pinged = subscription.ping() => pinged,
        };
        if let Err(e) = pinged {
            warn!(channel = %channel, error = %e, "Subscription ping failed");
            return Some(e);
        }

        loop {
            let raw = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = self.messages.closed() => {
                    debug!(channel = %channel, "Subscriber dropped its receiver");
                    return None;
                }
                raw = subscription.next_message() => raw,
            };

            let Some(raw) = raw else {
                warn!(channel = %channel, "Broker closed the subscription");
                return Some(Error::ChannelClosed {
                    channel: channel.to_string(),
                });
            };

            // Only `Hub::publish` writes to the channel, so this should not
            // happen; drop the message and keep listening.
            let event: M = match decode(&raw) {
                Ok(event) => event,
                Err(e) => {
                    self.inner.decode_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        channel = %channel,
                        error = %e,
                        bytes = raw.len(),
                        "Dropping undecodable message"
                    );
                    continue;
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                sent = self.messages.send(event) => {
                    if sent.is_err() {
                        debug!(channel = %channel, "Subscriber dropped its receiver");
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::Value;

    fn reply(count: Value) -> Value {
        Value::Array(vec![Value::BulkString(b"hermes-events".to_vec()), count])
    }

    #[test]
    fn test_parse_numsub_int() {
        assert_eq!(parse_numsub(&reply(Value::Int(3))).unwrap(), 3);
        assert_eq!(parse_numsub(&reply(Value::Int(0))).unwrap(), 0);
    }

    #[test]
    fn test_parse_numsub_string_count() {
        assert_eq!(
            parse_numsub(&reply(Value::BulkString(b"12".to_vec()))).unwrap(),
            12
        );
        assert_eq!(
            parse_numsub(&reply(Value::SimpleString("4".to_string()))).unwrap(),
            4
        );
    }

    #[test]
    fn test_parse_numsub_bad_shape() {
        let short = Value::Array(vec![Value::BulkString(b"hermes-events".to_vec())]);
        assert!(matches!(parse_numsub(&short), Err(Error::Protocol(_))));

        let err = parse_numsub(&Value::Nil).unwrap_err();
        assert!(err.to_string().contains("unexpected response shape"));

        let long = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(matches!(parse_numsub(&long), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_numsub_resp3_map() {
        let map = |count| Value::Map(vec![(Value::BulkString(b"hermes-events".to_vec()), count)]);
        assert_eq!(parse_numsub(&map(Value::Int(5))).unwrap(), 5);
        assert_eq!(parse_numsub(&map(Value::BulkString(b"2".to_vec()))).unwrap(), 2);
        assert!(matches!(
            parse_numsub(&map(Value::Int(-3))),
            Err(Error::Protocol(_))
        ));

        assert!(matches!(
            parse_numsub(&Value::Map(vec![])),
            Err(Error::Protocol(_))
        ));
        let two = Value::Map(vec![
            (Value::BulkString(b"a".to_vec()), Value::Int(1)),
            (Value::BulkString(b"b".to_vec()), Value::Int(2)),
        ]);
        assert!(matches!(parse_numsub(&two), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_numsub_bad_count() {
        assert!(matches!(
            parse_numsub(&reply(Value::Int(-1))),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            parse_numsub(&reply(Value::BulkString(b"three".to_vec()))),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            parse_numsub(&reply(Value::Nil)),
            Err(Error::Protocol(_))
        ));
    }
}
