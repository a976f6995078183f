//! # Message Store
//!
//! Append-only persistence of chat messages keyed by conversation key.
//! The store is the single source of truth for ordering: it assigns the id
//! and the authoritative timestamp when a message is persisted, never the
//! client.

use crate::error::AppResult;
use async_trait::async_trait;
use chat_core::{ChatMessage, ConversationKey, ValidatedMessage};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Backend label used in logs and metrics.
    fn backend(&self) -> &'static str;

    /// Persist a message and return it with its store-assigned id and timestamp.
    async fn append(
        &self,
        conversation_key: &ConversationKey,
        message: &ValidatedMessage,
    ) -> AppResult<ChatMessage>;

    /// All messages of the conversation, ascending by timestamp, ties by
    /// arrival order. Unknown keys yield an empty list.
    async fn list_all(&self, conversation_key: &ConversationKey) -> AppResult<Vec<ChatMessage>>;

    async fn health_check(&self) -> AppResult<()>;
}

/// Process-local store.
///
/// Appends are serialised by the write lock and every timestamp is strictly
/// greater than the previous one in the same conversation, so timestamp
/// order and arrival order coincide.
#[derive(Default)]
pub struct InMemoryMessageStore {
    conversations: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(last) if now <= last => last + Duration::microseconds(1),
        _ => now,
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn append(
        &self,
        conversation_key: &ConversationKey,
        message: &ValidatedMessage,
    ) -> AppResult<ChatMessage> {
        let mut guard = self.conversations.write().await;
        let messages = guard
            .entry(conversation_key.as_str().to_string())
            .or_default();

        let persisted = ChatMessage {
            id: Uuid::new_v4().to_string(),
            text: message.text().to_string(),
            sender: message.sender().to_string(),
            timestamp: next_timestamp(messages.last().map(|m| m.timestamp)),
        };
        messages.push(persisted.clone());

        Ok(persisted)
    }

    async fn list_all(&self, conversation_key: &ConversationKey) -> AppResult<Vec<ChatMessage>> {
        let guard = self.conversations.read().await;
        Ok(guard
            .get(conversation_key.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}
