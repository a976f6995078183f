//! # Chat Service
//!
//! Validation, store calls under a timeout, and snapshot fan-out.
//!
//! Every successful append is followed by a fresh `list_all` whose result is
//! published to the conversation's subscribers, so listeners see the new
//! message without any action by the sender.

use crate::error::{AppError, AppResult};
use crate::metrics::{MESSAGES_APPENDED_TOTAL, STORE_FAILURES_TOTAL};
use crate::services::message_store::MessageStore;
use crate::websocket::subscription::Snapshot;
use crate::websocket::{Subscription, SubscriptionHandle, SubscriptionRegistry};
use chat_core::{ChatMessage, ConversationKey, NewMessage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn MessageStore>,
    registry: SubscriptionRegistry,
    store_timeout: Duration,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: SubscriptionRegistry,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            store_timeout,
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    async fn with_timeout<T, F>(&self, operation: &'static str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let result = match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Unavailable(format!(
                "{operation} timed out after {}ms",
                self.store_timeout.as_millis()
            ))),
        };

        if let Err(e) = &result {
            STORE_FAILURES_TOTAL.with_label_values(&[operation]).inc();
            tracing::error!(operation, error = %e, "store operation failed");
        }
        result
    }

    /// Validate and persist a message, then publish the new snapshot.
    ///
    /// Invalid input is rejected before the store is touched.
    pub async fn append(
        &self,
        conversation_key: &ConversationKey,
        request: NewMessage,
    ) -> AppResult<ChatMessage> {
        let message = request.validate()?;

        let persisted = self
            .with_timeout("append", self.store.append(conversation_key, &message))
            .await?;

        MESSAGES_APPENDED_TOTAL
            .with_label_values(&[self.store.backend()])
            .inc();
        tracing::info!(
            conversation_key = %conversation_key,
            message_id = %persisted.id,
            sender = %persisted.sender,
            "message appended"
        );

        self.publish_snapshot(conversation_key).await;

        Ok(persisted)
    }

    async fn publish_snapshot(&self, conversation_key: &ConversationKey) {
        if self.registry.subscriber_count(conversation_key.as_str()).await == 0 {
            return;
        }

        match self
            .with_timeout("snapshot", self.store.list_all(conversation_key))
            .await
        {
            Ok(list) => {
                self.registry
                    .publish(conversation_key.as_str(), Arc::new(list))
                    .await;
            }
            Err(e) => {
                self.registry
                    .terminate_all(conversation_key.as_str(), &e.to_string())
                    .await;
            }
        }
    }

    /// All messages of the conversation, ascending by store timestamp.
    pub async fn list_all(&self, conversation_key: &ConversationKey) -> AppResult<Vec<ChatMessage>> {
        self.with_timeout("list_all", self.store.list_all(conversation_key))
            .await
    }

    /// One-shot history read: the whole ordered list at call time, or an error.
    pub async fn fetch_once(
        &self,
        conversation_key: &ConversationKey,
    ) -> AppResult<Vec<ChatMessage>> {
        self.list_all(conversation_key).await
    }

    /// Register a live subscription. The first item is the current snapshot.
    pub async fn subscribe(&self, conversation_key: &ConversationKey) -> AppResult<Subscription> {
        let (id, rx) = self
            .registry
            .add_subscriber(conversation_key.as_str())
            .await;

        match self.list_all(conversation_key).await {
            Ok(initial) => Ok(Subscription::new(
                conversation_key.clone(),
                id,
                self.registry.clone(),
                rx,
                Arc::new(initial),
            )),
            Err(e) => {
                self.registry
                    .remove_subscriber(conversation_key.as_str(), id)
                    .await;
                Err(e)
            }
        }
    }

    /// Callback form of [`subscribe`](Self::subscribe).
    ///
    /// `on_update` receives the full ordered list on every change.
    /// `on_error` runs at most once and ends delivery; recovering means
    /// subscribing again.
    pub async fn subscribe_with<F, E>(
        &self,
        conversation_key: &ConversationKey,
        on_update: F,
        on_error: E,
    ) -> SubscriptionHandle
    where
        F: FnMut(Snapshot) + Send + 'static,
        E: FnOnce(AppError) + Send + 'static,
    {
        match self.subscribe(conversation_key).await {
            Ok(sub) => SubscriptionHandle::spawn(sub, on_update, on_error),
            Err(e) => {
                on_error(AppError::SubscriptionTerminated(e.to_string()));
                SubscriptionHandle::dead(conversation_key.clone(), self.registry.clone())
            }
        }
    }

    /// Printable plain-text transcript of the conversation.
    pub async fn transcript(&self, conversation_key: &ConversationKey) -> AppResult<String> {
        let messages = self.fetch_once(conversation_key).await?;
        Ok(render_transcript(conversation_key, &messages))
    }

    pub async fn health_check(&self) -> AppResult<()> {
        self.with_timeout("health_check", self.store.health_check())
            .await
    }
}

fn render_transcript(conversation_key: &ConversationKey, messages: &[ChatMessage]) -> String {
    let mut out = format!("Conversation {conversation_key}\n");
    out.push_str(&format!("{} message(s)\n\n", messages.len()));
    for m in messages {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            m.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            m.sender,
            m.text
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::message_store::InMemoryMessageStore;
    use async_trait::async_trait;
    use chat_core::ValidatedMessage;
    use tokio::sync::mpsc;

    fn service() -> ChatService {
        ChatService::new(
            Arc::new(InMemoryMessageStore::new()),
            SubscriptionRegistry::new(),
            Duration::from_secs(5),
        )
    }

    /// Store whose `list_all` fails once appends have been made.
    struct ListFailsAfterAppend {
        inner: InMemoryMessageStore,
        appended: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl MessageStore for ListFailsAfterAppend {
        fn backend(&self) -> &'static str {
            "test"
        }

        async fn append(
            &self,
            key: &ConversationKey,
            message: &ValidatedMessage,
        ) -> AppResult<ChatMessage> {
            self.appended
                .store(true, std::sync::atomic::Ordering::SeqCst);
            self.inner.append(key, message).await
        }

        async fn list_all(&self, key: &ConversationKey) -> AppResult<Vec<ChatMessage>> {
            if self.appended.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(AppError::Unavailable("connection reset".into()));
            }
            self.inner.list_all(key).await
        }

        async fn health_check(&self) -> AppResult<()> {
            Ok(())
        }
    }

    /// Store that never answers.
    struct HungStore;

    #[async_trait]
    impl MessageStore for HungStore {
        fn backend(&self) -> &'static str {
            "hung"
        }

        async fn append(&self, _: &ConversationKey, _: &ValidatedMessage) -> AppResult<ChatMessage> {
            futures::future::pending().await
        }

        async fn list_all(&self, _: &ConversationKey) -> AppResult<Vec<ChatMessage>> {
            futures::future::pending().await
        }

        async fn health_check(&self) -> AppResult<()> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn invalid_append_is_not_persisted() {
        let chat = service();
        let key = ConversationKey::global_room();

        let err = chat
            .append(&key, NewMessage::new("", "patient"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        let err = chat
            .append(
                &key,
                NewMessage {
                    text: Some("Hello".into()),
                    sender: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        assert!(chat.list_all(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_once_matches_append_result() {
        let chat = service();
        let key = chat_core::resolve_conversation_key("doctor-1", "patient-42");

        let appended = chat
            .append(&key, NewMessage::new("Hello", "patient"))
            .await
            .unwrap();
        let fetched = chat.fetch_once(&key).await.unwrap();

        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].text, appended.text);
        assert_eq!(fetched[0].sender, appended.sender);
        assert_eq!(fetched[0].id, appended.id);
    }

    #[tokio::test]
    async fn subscription_starts_with_current_snapshot() {
        let chat = service();
        let key = ConversationKey::global_room();
        chat.append(&key, NewMessage::new("first", "Dr. Rao"))
            .await
            .unwrap();

        let mut sub = chat.subscribe(&key).await.unwrap();
        let initial = sub.next().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        chat.append(&key, NewMessage::new("second", "Sam"))
            .await
            .unwrap();
        let update = sub.next().await.unwrap().unwrap();
        let texts: Vec<_> = update.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[tokio::test]
    async fn stale_snapshots_are_skipped() {
        let chat = service();
        let key = ConversationKey::global_room();
        let mut sub = chat.subscribe(&key).await.unwrap();
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        let m1 = chat.append(&key, NewMessage::new("a", "x")).await.unwrap();
        // A late fan-out carrying an older view must not be delivered.
        chat.registry()
            .publish(key.as_str(), Arc::new(Vec::new()))
            .await;
        chat.registry()
            .publish(key.as_str(), Arc::new(vec![m1.clone()]))
            .await;
        chat.append(&key, NewMessage::new("b", "x")).await.unwrap();

        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn failed_snapshot_terminates_subscribers_once() {
        let chat = ChatService::new(
            Arc::new(ListFailsAfterAppend {
                inner: InMemoryMessageStore::new(),
                appended: Default::default(),
            }),
            SubscriptionRegistry::new(),
            Duration::from_secs(5),
        );
        let key = ConversationKey::global_room();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let err_tx = tx.clone();
        let handle = chat
            .subscribe_with(
                &key,
                move |snapshot| {
                    let _ = tx.send(Ok(snapshot.len()));
                },
                move |e| {
                    let _ = err_tx.send(Err(e));
                },
            )
            .await;

        assert_eq!(rx.recv().await.unwrap().unwrap(), 0);

        // The append itself succeeds even though the follow-up read fails.
        chat.append(&key, NewMessage::new("hi", "patient"))
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            Err(AppError::SubscriptionTerminated(_))
        ));
        // Both callbacks are gone with the task: the channel closes.
        assert!(rx.recv().await.is_none());
        assert!(!handle.is_active());
        assert_eq!(chat.registry().subscriber_count(key.as_str()).await, 0);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let chat = service();
        let key = ConversationKey::global_room();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = chat
            .subscribe_with(
                &key,
                move |snapshot| {
                    let _ = tx.send(snapshot.len());
                },
                |_| {},
            )
            .await;
        assert_eq!(rx.recv().await, Some(0));

        handle.unsubscribe().await;
        assert_eq!(chat.registry().subscriber_count(key.as_str()).await, 0);

        chat.append(&key, NewMessage::new("after", "doctor"))
            .await
            .unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_subscriptions_release_their_slots() {
        let chat = service();
        let key = ConversationKey::room("ward-9");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = chat
            .subscribe_with(
                &key,
                move |snapshot| {
                    let _ = tx.send(snapshot.len());
                },
                |_| {},
            )
            .await;
        assert_eq!(rx.recv().await, Some(0));

        let sub = chat.subscribe(&key).await.unwrap();
        assert_eq!(chat.registry().subscriber_count(key.as_str()).await, 2);

        drop(handle);
        drop(sub);

        // No fan-out happens in between; cleanup runs on the runtime.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(chat.registry().subscriber_count(key.as_str()).await, 0);
    }

    #[tokio::test]
    async fn dropped_stream_releases_its_slot() {
        let chat = service();
        let key = ConversationKey::room("ward-10");

        let stream = chat.subscribe(&key).await.unwrap().into_stream();
        assert_eq!(chat.registry().subscriber_count(key.as_str()).await, 1);

        drop(stream);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(chat.registry().subscriber_count(key.as_str()).await, 0);
    }

    #[tokio::test]
    async fn hung_store_times_out_as_unavailable() {
        let chat = ChatService::new(
            Arc::new(HungStore),
            SubscriptionRegistry::new(),
            Duration::from_millis(20),
        );
        let key = ConversationKey::global_room();

        let err = chat
            .append(&key, NewMessage::new("hello", "patient"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));

        let err = chat.subscribe(&key).await.err().unwrap();
        assert!(matches!(err, AppError::Unavailable(_)));
        assert_eq!(chat.registry().subscriber_count(key.as_str()).await, 0);
    }

    #[tokio::test]
    async fn transcript_lists_messages_in_order() {
        let chat = service();
        let key = ConversationKey::room("ward-3");
        chat.append(&key, NewMessage::new("How are you feeling?", "doctor"))
            .await
            .unwrap();
        chat.append(&key, NewMessage::new("Better today", "patient"))
            .await
            .unwrap();

        let transcript = chat.transcript(&key).await.unwrap();
        let lines: Vec<_> = transcript.lines().collect();
        assert_eq!(lines[0], "Conversation room_ward-3");
        assert_eq!(lines[1], "2 message(s)");
        assert!(lines[3].ends_with("doctor: How are you feeling?"));
        assert!(lines[4].ends_with("patient: Better today"));
    }
}
