//! Event fan-out to subscribed clients
//!
//! Publishing is fire-and-forget: [`BroadcastAdapter`] logs failures and
//! never hands them back to the state transition that produced the event.

pub mod local;
pub mod pubsub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::events::{now_millis, EventKind};

pub use local::LocalBroadcaster;
pub use pubsub::{spawn_relay, RedisBroadcaster};

/// One event as it travels between instances and out to SSE clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    pub channel: String,
    pub event: EventKind,
    pub payload: serde_json::Value,
    pub published_at_ms: u64,
}

impl BroadcastMessage {
    pub fn new(channel: &str, event: EventKind, payload: serde_json::Value) -> Self {
        Self {
            channel: channel.to_string(),
            event,
            payload,
            published_at_ms: now_millis(),
        }
    }
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), String>;
}

/// Fire-and-forget publishing front end
#[derive(Clone)]
pub struct BroadcastAdapter {
    inner: Arc<dyn Broadcaster>,
}

impl BroadcastAdapter {
    pub fn new(inner: Arc<dyn Broadcaster>) -> Self {
        Self { inner }
    }

    /// Publish `payload` as `event` on `channel`. Returns whether the
    /// publish went through; callers are free to ignore it.
    pub async fn publish<T: Serialize>(&self, channel: &str, event: EventKind, payload: &T) -> bool {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize '{}' payload: {}", event, e);
                return false;
            }
        };

        match self
            .inner
            .publish(BroadcastMessage::new(channel, event, payload))
            .await
        {
            Ok(()) => {
                tracing::trace!("Published '{}' on channel '{}'", event, channel);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to publish '{}' on channel '{}': {}", event, channel, e);
                false
            }
        }
    }
}
