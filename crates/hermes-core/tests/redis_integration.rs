//! Redis integration tests
//!
//! Require a running Redis instance at `REDIS_URL` (default
//! `redis://127.0.0.1:6379`). Run with: cargo test --features redis-tests

#![cfg(feature = "redis-tests")]

use hermes_core::{CancellationToken, HubConfig, Message, RedisHub, Visibility};
use std::time::Duration;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

async fn connect(channel: &str) -> RedisHub {
    RedisHub::connect(&redis_url(), HubConfig::default().with_channel(channel))
        .await
        .expect("Redis should be running")
}

async fn wait_for_subscribers(hub: &RedisHub, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while hub.subscribers().await.unwrap() < expected {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("subscribers did not settle");
}

#[tokio::test]
async fn test_redis_publish_subscribe() {
    let publisher = connect("hermes-test:publish").await;
    let listener = connect("hermes-test:publish").await;

    let cancel = CancellationToken::new();
    let mut sub = listener.subscribe::<Message>(cancel.clone());
    wait_for_subscribers(&publisher, 1).await;

    let msg = Message::new(
        "octocat/hello-world",
        Visibility::Public,
        serde_json::json!({"n": 1}),
    );
    publisher.publish(&msg).await.unwrap();
    assert_eq!(sub.recv().await.unwrap(), msg);

    cancel.cancel();
    assert!(sub.next().await.is_none());
}

#[tokio::test]
async fn test_redis_skips_foreign_payloads() {
    use hermes_core::Broker;

    let hub = connect("hermes-test:garbage").await;
    let mut sub = hub.subscribe::<Message>(CancellationToken::new());
    wait_for_subscribers(&hub, 1).await;

    hub.broker()
        .publish("hermes-test:garbage", b"garbage".to_vec())
        .await
        .unwrap();
    let msg = Message::new("a/b", Visibility::Internal, serde_json::Value::Null);
    hub.publish(&msg).await.unwrap();

    assert_eq!(sub.recv().await.unwrap(), msg);
    assert_eq!(hub.decode_failures(), 1);
}

#[tokio::test]
async fn test_redis_unreachable() {
    let result = RedisHub::connect("redis://127.0.0.1:1", HubConfig::default()).await;
    assert!(matches!(result, Err(hermes_core::Error::Unavailable(_))));
}
