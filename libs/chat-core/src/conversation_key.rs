use serde::Serialize;
use std::fmt;
use thiserror::Error;

const MAX_KEY_LEN: usize = 256;

/// Path segments taken by fixed routes under `/api/chat/`.
const RESERVED_KEYS: &[&str] = &["key"];

/// Deterministic identifier of a message thread.
///
/// There is no conversation record: storage is keyed directly by this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("conversation key is empty")]
    Empty,

    #[error("conversation key exceeds 256 bytes")]
    TooLong,

    #[error("conversation key contains invalid character {0:?}")]
    InvalidChar(char),

    #[error("conversation key {0:?} is reserved")]
    Reserved(String),
}

/// Key of the two-party thread between `a` and `b`.
///
/// Identifiers are sorted first, so `resolve_conversation_key(a, b)` and
/// `resolve_conversation_key(b, a)` are equal.
pub fn resolve_conversation_key(a: &str, b: &str) -> ConversationKey {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    ConversationKey(format!("doctor_{lo}_patient_{hi}"))
}

impl ConversationKey {
    /// App-wide group room.
    pub const GLOBAL_ROOM: &'static str = "room_global";

    /// Fixed key of a shared room.
    pub fn room(name: &str) -> Self {
        ConversationKey(format!("room_{name}"))
    }

    pub fn global_room() -> Self {
        ConversationKey(Self::GLOBAL_ROOM.to_string())
    }

    /// Validate a key received from outside (URL path, config).
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(KeyError::TooLong);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '@')))
        {
            return Err(KeyError::InvalidChar(c));
        }
        if RESERVED_KEYS.contains(&raw) {
            return Err(KeyError::Reserved(raw.to_string()));
        }
        Ok(ConversationKey(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
