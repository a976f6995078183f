//! Frames pushed to subscribers over the chat WebSocket.
//!
//! ```json
//! { "type": "snapshot", "conversation_key": "room_global", "messages": [ ... ] }
//! { "type": "error", "code": "SUBSCRIPTION_TERMINATED", "message": "..." }
//! ```
//!
//! Every change delivers the whole ordered message list, never a delta. An
//! `error` frame is terminal: the server closes the socket right after it.

use crate::message::ChatMessage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SubscriptionFrame {
    #[serde(rename = "snapshot")]
    Snapshot {
        conversation_key: String,
        messages: Vec<ChatMessage>,
    },

    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl SubscriptionFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_frame_is_tagged() {
        let frame = SubscriptionFrame::Snapshot {
            conversation_key: "room_global".into(),
            messages: vec![],
        };
        let json: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["conversation_key"], "room_global");
        assert!(json["messages"].as_array().unwrap().is_empty());
    }

    #[test]
    fn error_frame_parses() {
        let frame = SubscriptionFrame::from_json(
            r#"{"type":"error","code":"SUBSCRIPTION_TERMINATED","message":"store unavailable"}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            SubscriptionFrame::Error {
                code: "SUBSCRIPTION_TERMINATED".into(),
                message: "store unavailable".into(),
            }
        );
    }
}
