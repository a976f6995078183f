use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum message body length, in characters.
pub const MAX_TEXT_LEN: usize = 4000;

/// Maximum sender tag / display name length, in characters.
pub const MAX_SENDER_LEN: usize = 128;

/// A message as persisted by the store.
///
/// `id` and `timestamp` are assigned by the store at persistence time; the
/// timestamp is the authoritative ordering key for the conversation.
/// Messages are never edited or removed once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
}

/// Append request body (`POST /api/chat/{key}`).
///
/// Both fields are optional on the wire so a missing field is reported as a
/// validation error instead of a body deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

impl NewMessage {
    pub fn new(text: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            sender: Some(sender.into()),
        }
    }

    /// Check the request and produce the value stores accept.
    ///
    /// Text is kept as typed; the sender is trimmed.
    pub fn validate(&self) -> Result<ValidatedMessage, ValidationError> {
        let text = match self.text.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(ValidationError::EmptyText),
        };
        let sender = match self.sender.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return Err(ValidationError::MissingSender),
        };

        if text.chars().count() > MAX_TEXT_LEN {
            return Err(ValidationError::TextTooLong { max: MAX_TEXT_LEN });
        }
        if sender.chars().count() > MAX_SENDER_LEN {
            return Err(ValidationError::SenderTooLong {
                max: MAX_SENDER_LEN,
            });
        }

        Ok(ValidatedMessage {
            text: text.to_string(),
            sender: sender.to_string(),
        })
    }
}

/// An append request that passed validation. Only obtainable through
/// [`NewMessage::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMessage {
    text: String,
    sender: String,
}

impl ValidatedMessage {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message text is required")]
    EmptyText,

    #[error("message sender is required")]
    MissingSender,

    #[error("message text exceeds {max} characters")]
    TextTooLong { max: usize },

    #[error("message sender exceeds {max} characters")]
    SenderTooLong { max: usize },
}

/// Role tags used as `sender` in two-party patient/doctor conversations.
/// Group rooms use a free-form display name instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Patient,
    Doctor,
    Admin,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Patient => "patient",
            SenderRole::Doctor => "doctor",
            SenderRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for SenderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
