//! Shared chat domain types for the HealthSight chat service and its clients.
//!
//! - `message`: persisted messages, append requests and their validation
//! - `conversation_key`: deterministic conversation identity
//! - `frames`: server → client frames carried on the live subscription socket

pub mod conversation_key;
pub mod frames;
pub mod message;

pub use conversation_key::{resolve_conversation_key, ConversationKey, KeyError};
pub use frames::SubscriptionFrame;
pub use message::{
    ChatMessage, NewMessage, SenderRole, ValidatedMessage, ValidationError, MAX_SENDER_LEN,
    MAX_TEXT_LEN,
};
