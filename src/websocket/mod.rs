use chat_core::ChatMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod subscription;

pub use subscription::{Subscription, SubscriptionHandle};

/// Unique identifier for a live subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// What a subscriber receives on its channel.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// Full ordered message list of the conversation.
    Snapshot(Arc<Vec<ChatMessage>>),
    /// Delivery is over; the subscriber has already been removed.
    Terminated(String),
}

struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<SubscriptionEvent>,
}

/// Registry of live subscribers per conversation key.
///
/// Dead senders are pruned on every fan-out and empty keys are dropped, so a
/// subscriber that went away without unsubscribing costs at most one failed
/// send.
#[derive(Default, Clone)]
pub struct SubscriptionRegistry {
    // conversation key -> subscribers
    inner: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_subscriber(
        &self,
        conversation_key: &str,
    ) -> (SubscriberId, UnboundedReceiver<SubscriptionEvent>) {
        let (tx, rx) = unbounded_channel();
        let subscriber_id = SubscriberId::new();

        let mut guard = self.inner.write().await;
        let subscribers = guard.entry(conversation_key.to_string()).or_default();
        subscribers.push(Subscriber {
            id: subscriber_id,
            sender: tx,
        });

        tracing::debug!(
            conversation_key,
            ?subscriber_id,
            total = subscribers.len(),
            "subscriber added"
        );
        crate::metrics::ACTIVE_SUBSCRIBERS.inc();

        (subscriber_id, rx)
    }

    pub async fn remove_subscriber(&self, conversation_key: &str, subscriber_id: SubscriberId) {
        let mut guard = self.inner.write().await;

        if let Some(subscribers) = guard.get_mut(conversation_key) {
            let before = subscribers.len();
            subscribers.retain(|s| s.id != subscriber_id);
            let removed = before - subscribers.len();

            if removed > 0 {
                crate::metrics::ACTIVE_SUBSCRIBERS.sub(removed as i64);
                tracing::debug!(
                    conversation_key,
                    ?subscriber_id,
                    remaining = subscribers.len(),
                    "subscriber removed"
                );
            }

            if subscribers.is_empty() {
                guard.remove(conversation_key);
            }
        }
    }

    /// Push a snapshot to every subscriber of `conversation_key`.
    pub async fn publish(&self, conversation_key: &str, snapshot: Arc<Vec<ChatMessage>>) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.get_mut(conversation_key) {
            let before = subscribers.len();
            subscribers.retain(|s| {
                s.sender
                    .send(SubscriptionEvent::Snapshot(snapshot.clone()))
                    .is_ok()
            });
            let dead = before - subscribers.len();

            if dead > 0 {
                crate::metrics::ACTIVE_SUBSCRIBERS.sub(dead as i64);
                tracing::debug!(
                    conversation_key,
                    dead,
                    active = subscribers.len(),
                    "pruned dead subscribers during publish"
                );
            }
            if subscribers.is_empty() {
                guard.remove(conversation_key);
            }
        }
    }

    /// End every subscription of `conversation_key` with an error.
    pub async fn terminate_all(&self, conversation_key: &str, reason: &str) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.remove(conversation_key) {
            crate::metrics::ACTIVE_SUBSCRIBERS.sub(subscribers.len() as i64);
            tracing::warn!(
                conversation_key,
                count = subscribers.len(),
                reason,
                "terminating subscriptions"
            );
            for s in subscribers {
                let _ = s
                    .sender
                    .send(SubscriptionEvent::Terminated(reason.to_string()));
            }
        }
    }

    pub async fn subscriber_count(&self, conversation_key: &str) -> usize {
        let guard = self.inner.read().await;
        guard.get(conversation_key).map(|v| v.len()).unwrap_or(0)
    }
}
