// Change notification: an explicit topic-indexed registry object injected
// into the core, not process-wide state. Delivery is best-effort,
// at-most-once to currently live subscribers, and never blocks or fails
// the owning transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub topic: String,
    pub message_id: String,
    pub event: String,
    pub payload: Value,
}

#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Best-effort publish; implementations must not error into the caller.
    async fn publish(&self, topic: &str, message_id: &str, event: &str, payload: Value);
}

/// Topic-indexed fan-out registry with an explicit lifecycle: construct it,
/// hand it to the core, `close()` it on shutdown. Subscribers that lag past
/// the channel capacity miss events rather than block publishers.
#[derive(Debug)]
pub struct TopicRegistry {
    topics: Mutex<HashMap<String, broadcast::Sender<ChangeEvent>>>,
    capacity: usize,
}

impl TopicRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a topic, creating its channel on first use.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<ChangeEvent> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of live subscribers on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .await
            .get(topic)
            .map_or(0, |sender| sender.receiver_count())
    }

    /// Drop all channels; existing receivers see the streams end.
    pub async fn close(&self) {
        self.topics.lock().await.clear();
    }
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl ChangeNotifier for TopicRegistry {
    async fn publish(&self, topic: &str, message_id: &str, event: &str, payload: Value) {
        let sender = {
            let topics = self.topics.lock().await;
            topics.get(topic).cloned()
        };
        let Some(sender) = sender else {
            // No subscribers ever asked for this topic.
            return;
        };
        let delivered = sender
            .send(ChangeEvent {
                topic: topic.to_string(),
                message_id: message_id.to_string(),
                event: event.to_string(),
                payload,
            })
            .unwrap_or(0);
        debug!(topic, event, delivered, "change event published");
    }
}

/// Discards everything; for callers that opt out of live updates.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl ChangeNotifier for NullNotifier {
    async fn publish(&self, _topic: &str, _message_id: &str, _event: &str, _payload: Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let registry = TopicRegistry::new(8);
        let mut rx = registry.subscribe("filing.a").await;

        registry
            .publish("filing.a", "m1", "status_changed", serde_json::json!({"to": "v1_submitted"}))
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "status_changed");
        assert_eq!(event.message_id, "m1");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let registry = TopicRegistry::new(8);
        registry
            .publish("nobody-home", "m1", "status_changed", Value::Null)
            .await;
        assert_eq!(registry.subscriber_count("nobody-home").await, 0);
    }

    #[tokio::test]
    async fn close_ends_the_streams() {
        let registry = TopicRegistry::new(8);
        let mut rx = registry.subscribe("filing.a").await;
        registry.close().await;
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }
}
