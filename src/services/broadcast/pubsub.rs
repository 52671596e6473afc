//! Cross-instance fan-out over Redis pub/sub
//!
//! Every instance publishes to `{prefix}events:{channel}` and runs one relay
//! that pattern-subscribes to `{prefix}events:*` and forwards into its own
//! [`LocalBroadcaster`]. An instance's own events come back through the
//! relay like everyone else's.

use async_trait::async_trait;
use redis::AsyncCommands;
use rocket::futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::{BroadcastMessage, Broadcaster, LocalBroadcaster};
use crate::models::coordinator::PrefixedStoreKeys;

pub struct RedisBroadcaster {
    redis: redis::Client,
    keys: PrefixedStoreKeys,
}

impl RedisBroadcaster {
    pub fn new(redis: redis::Client, keys: PrefixedStoreKeys) -> Self {
        Self { redis, keys }
    }
}

#[async_trait]
impl Broadcaster for RedisBroadcaster {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), String> {
        let body = serde_json::to_string(&message)
            .map_err(|e| format!("Failed to encode broadcast message: {e}"))?;

        let mut conn = self
            .redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| format!("Failed to get Redis connection: {e}"))?;

        let _receivers: i64 = conn
            .publish(self.keys.events_channel(&message.channel), body)
            .await
            .map_err(|e| format!("Failed to publish to Redis: {e}"))?;
        Ok(())
    }
}

/// Forward every message on `{prefix}events:*` to `local` until the
/// subscription drops.
pub async fn run_relay(
    redis: &redis::Client,
    keys: &PrefixedStoreKeys,
    local: &LocalBroadcaster,
) -> Result<(), String> {
    let mut pubsub = redis
        .get_async_pubsub()
        .await
        .map_err(|e| format!("Failed to open Redis pub/sub connection: {e}"))?;

    pubsub
        .psubscribe(keys.events_pattern())
        .await
        .map_err(|e| format!("Failed to subscribe to {}: {e}", keys.events_pattern()))?;

    tracing::info!("Broadcast relay subscribed to {}", keys.events_pattern());

    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
        let body: String = match msg.get_payload() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Dropping unreadable pub/sub payload: {}", e);
                continue;
            }
        };

        match serde_json::from_str::<BroadcastMessage>(&body) {
            Ok(message) => {
                local.deliver(message);
            }
            Err(e) => tracing::warn!("Dropping malformed broadcast message: {}", e),
        }
    }

    Err("Redis pub/sub stream ended".to_string())
}

/// Run the relay forever, reconnecting after `retry_delay` on failure
pub fn spawn_relay(
    redis: redis::Client,
    keys: PrefixedStoreKeys,
    local: Arc<LocalBroadcaster>,
    retry_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = run_relay(&redis, &keys, &local).await {
                tracing::warn!("Broadcast relay stopped, retrying in {:?}: {}", retry_delay, e);
            }
            tokio::time::sleep(retry_delay).await;
        }
    })
}
