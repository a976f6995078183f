//! PostgreSQL message store.
//!
//! Every append bumps `chat_conversation_counters` for its key in the same
//! statement. The counter row lock serialises concurrent appends to one
//! conversation, and `created_at` defaults to `clock_timestamp()`, taken after
//! the lock is held, so timestamp order follows arrival order.

use crate::error::AppResult;
use crate::models::MessageRow;
use crate::services::message_store::MessageStore;
use async_trait::async_trait;
use chat_core::{ChatMessage, ConversationKey, ValidatedMessage};
use db_pool::{acquire_with_metrics, PgPool};
use uuid::Uuid;

pub const SCHEMA: &str = include_str!("../../migrations/0001_chat_messages.sql");

const SERVICE_NAME: &str = "healthsight-chat-service";

pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn append(
        &self,
        conversation_key: &ConversationKey,
        message: &ValidatedMessage,
    ) -> AppResult<ChatMessage> {
        let id = Uuid::new_v4();
        let client = acquire_with_metrics(&self.pool, SERVICE_NAME).await?;

        let row = client
            .query_one(
                r#"
                WITH next AS (
                    INSERT INTO chat_conversation_counters (conversation_key, last_seq)
                    VALUES ($2, 1)
                    ON CONFLICT (conversation_key)
                    DO UPDATE SET last_seq = chat_conversation_counters.last_seq + 1
                    RETURNING last_seq
                )
                INSERT INTO chat_messages (
                    id,
                    conversation_key,
                    sender,
                    text,
                    sequence_number
                )
                SELECT $1, $2, $3, $4, next.last_seq
                FROM next
                RETURNING id, conversation_key, sender, text, sequence_number, created_at
                "#,
                &[
                    &id,
                    &conversation_key.as_str(),
                    &message.sender(),
                    &message.text(),
                ],
            )
            .await?;

        Ok(MessageRow::from_row(&row)?.into())
    }

    async fn list_all(&self, conversation_key: &ConversationKey) -> AppResult<Vec<ChatMessage>> {
        let client = acquire_with_metrics(&self.pool, SERVICE_NAME).await?;

        let rows = client
            .query(
                r#"
                SELECT id, conversation_key, sender, text, sequence_number, created_at
                FROM chat_messages
                WHERE conversation_key = $1
                ORDER BY created_at ASC, sequence_number ASC
                "#,
                &[&conversation_key.as_str()],
            )
            .await?;

        rows.iter()
            .map(|row| MessageRow::from_row(row).map(ChatMessage::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn health_check(&self) -> AppResult<()> {
        let client = acquire_with_metrics(&self.pool, SERVICE_NAME).await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }
}
