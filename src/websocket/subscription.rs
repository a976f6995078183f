//! Consumer side of a live conversation subscription.

use super::{SubscriberId, SubscriptionEvent, SubscriptionRegistry};
use crate::error::{AppError, AppResult};
use chat_core::{ChatMessage, ConversationKey};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

pub type Snapshot = Arc<Vec<ChatMessage>>;

/// A registered subscription yielding whole ordered snapshots.
///
/// Conversations are append-only, so a snapshot's length is its version.
/// Snapshots that are not longer than the last one delivered are skipped:
/// two fan-outs racing each other can never make a subscriber go back in
/// time.
pub struct Subscription {
    conversation_key: ConversationKey,
    id: SubscriberId,
    registry: SubscriptionRegistry,
    rx: UnboundedReceiver<SubscriptionEvent>,
    initial: Option<Snapshot>,
    delivered_len: Option<usize>,
    finished: bool,
    released: bool,
}

impl Subscription {
    pub(crate) fn new(
        conversation_key: ConversationKey,
        id: SubscriberId,
        registry: SubscriptionRegistry,
        rx: UnboundedReceiver<SubscriptionEvent>,
        initial: Snapshot,
    ) -> Self {
        Self {
            conversation_key,
            id,
            registry,
            rx,
            initial: Some(initial),
            delivered_len: None,
            finished: false,
            released: false,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn conversation_key(&self) -> &ConversationKey {
        &self.conversation_key
    }

    /// Next snapshot, a single terminal error, then `None` forever.
    pub async fn next(&mut self) -> Option<AppResult<Snapshot>> {
        if self.finished {
            return None;
        }

        if let Some(initial) = self.initial.take() {
            self.delivered_len = Some(initial.len());
            return Some(Ok(initial));
        }

        while let Some(event) = self.rx.recv().await {
            match event {
                SubscriptionEvent::Snapshot(snapshot) => {
                    if self.delivered_len.map_or(true, |n| snapshot.len() > n) {
                        self.delivered_len = Some(snapshot.len());
                        return Some(Ok(snapshot));
                    }
                }
                SubscriptionEvent::Terminated(reason) => {
                    self.finished = true;
                    return Some(Err(AppError::SubscriptionTerminated(reason)));
                }
            }
        }

        self.finished = true;
        None
    }

    /// Stop delivery and release the registry slot.
    pub async fn unsubscribe(mut self) {
        self.finished = true;
        self.released = true;
        self.registry
            .remove_subscriber(self.conversation_key.as_str(), self.id)
            .await;
    }

    pub fn into_stream(self) -> impl Stream<Item = AppResult<Snapshot>> {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|item| (item, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.released {
            release_in_background(&self.registry, &self.conversation_key, self.id);
        }
    }
}

/// Remove a subscriber from a synchronous drop.
///
/// Outside a runtime nothing can be spawned; the slot is then pruned by the
/// next fan-out to that key.
fn release_in_background(
    registry: &SubscriptionRegistry,
    conversation_key: &ConversationKey,
    id: SubscriberId,
) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        let registry = registry.clone();
        let conversation_key = conversation_key.clone();
        handle.spawn(async move {
            registry
                .remove_subscriber(conversation_key.as_str(), id)
                .await;
        });
    }
}

/// Callback-driven subscription returned by
/// [`ChatService::subscribe_with`](crate::services::chat_service::ChatService::subscribe_with).
///
/// Dropping the handle stops delivery and releases the registry slot in the
/// background. [`unsubscribe`](Self::unsubscribe) releases it before
/// returning.
pub struct SubscriptionHandle {
    conversation_key: ConversationKey,
    id: Option<SubscriberId>,
    registry: SubscriptionRegistry,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub(crate) fn spawn<F, E>(sub: Subscription, mut on_update: F, on_error: E) -> Self
    where
        F: FnMut(Snapshot) + Send + 'static,
        E: FnOnce(AppError) + Send + 'static,
    {
        let conversation_key = sub.conversation_key.clone();
        let id = sub.id;
        let registry = sub.registry.clone();

        let task = tokio::spawn(async move {
            let mut sub = sub;
            while let Some(item) = sub.next().await {
                match item {
                    Ok(snapshot) => on_update(snapshot),
                    Err(e) => {
                        on_error(e);
                        return;
                    }
                }
            }
        });

        Self {
            conversation_key,
            id: Some(id),
            registry,
            task: Some(task),
        }
    }

    /// Handle for a subscription that failed before registering.
    pub(crate) fn dead(conversation_key: ConversationKey, registry: SubscriptionRegistry) -> Self {
        Self {
            conversation_key,
            id: None,
            registry,
            task: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub async fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(id) = self.id.take() {
            self.registry
                .remove_subscriber(self.conversation_key.as_str(), id)
                .await;
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(id) = self.id.take() {
            release_in_background(&self.registry, &self.conversation_key, id);
        }
    }
}
