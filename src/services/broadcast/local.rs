use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

use super::{BroadcastMessage, Broadcaster};

/// In-process fan-out, one `tokio::sync::broadcast` channel per channel id.
///
/// SSE connections on this instance subscribe here. Slow subscribers lag and
/// skip events, which is fine since every payload is a full snapshot.
pub struct LocalBroadcaster {
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<BroadcastMessage>>>,
}

impl LocalBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to `channel`, dropping channels nobody listens to anymore
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<BroadcastMessage> {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels.retain(|name, sender| name == channel || sender.receiver_count() > 0);
        let receiver = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        tracing::debug!("New local subscriber on channel '{}'", channel);
        receiver
    }

    /// Hand `message` to every local subscriber of its channel.
    ///
    /// Returns the number of subscribers reached (zero is not an error).
    /// Channels without subscribers are never created here.
    pub fn deliver(&self, message: BroadcastMessage) -> usize {
        let sender = self
            .channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&message.channel)
            .cloned();

        match sender {
            Some(sender) if sender.receiver_count() > 0 => sender.send(message).unwrap_or(0),
            Some(_) => {
                self.channels
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .retain(|_, sender| sender.receiver_count() > 0);
                0
            }
            None => 0,
        }
    }

    /// Channels currently tracked, live or awaiting pruning
    pub fn channel_count(&self) -> usize {
        self.channels.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for LocalBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Broadcaster for LocalBroadcaster {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), String> {
        self.deliver(message);
        Ok(())
    }
}
