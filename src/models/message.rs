use chat_core::ChatMessage;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

/// Row of `chat_messages`.
/// `sequence_number` is the arrival order within the conversation and breaks
/// timestamp ties; it is not part of the public message shape.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: Uuid,
    pub conversation_key: String,
    pub sender: String,
    pub text: String,
    pub sequence_number: i64,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    /// Columns expected in order: id, conversation_key, sender, text,
    /// sequence_number, created_at.
    pub fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: row.try_get(0)?,
            conversation_key: row.try_get(1)?,
            sender: row.try_get(2)?,
            text: row.try_get(3)?,
            sequence_number: row.try_get(4)?,
            created_at: row.try_get(5)?,
        })
    }
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        ChatMessage {
            id: row.id.to_string(),
            text: row.text,
            sender: row.sender,
            timestamp: row.created_at,
        }
    }
}
