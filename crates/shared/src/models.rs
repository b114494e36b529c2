//! Payloads exchanged over the real-time connection.
//!
//! Call signaling payloads are opaque here; the peer negotiation layer owns
//! their meaning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Chat ---

/// A chat message pushed on `/topic/chat/{chatId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    #[serde(default)]
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub sender_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body published to `/app/sendMessage`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingChatMessage {
    pub chat_id: i64,
    pub content: String,
    /// Client-generated id so the sender can match the echoed message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

// --- Typing ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub chat_id: i64,
    pub user_id: String,
    pub typing: bool,
}

// --- Calls ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CallSignalKind {
    Ring,
    Offer,
    Answer,
    IceCandidate,
    Reject,
    Hangup,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallSignal {
    pub chat_id: i64,
    pub from_user_id: String,
    #[serde(rename = "type")]
    pub kind: CallSignalKind,
    #[serde(default)]
    pub payload: serde_json::Value,
}

// --- Notifications ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Extra fields specific to the notification kind (post id, friend request id, ...)
    #[serde(default)]
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_message_tolerates_sparse_payloads() {
        let msg: ChatMessage = serde_json::from_value(json!({"id": 1, "content": "hi"})).unwrap();
        assert_eq!(msg.id, 1);
        assert_eq!(msg.content, "hi");
        assert!(msg.chat_id.is_none());
    }

    #[test]
    fn call_signal_uses_type_tag() {
        let signal = CallSignal {
            chat_id: 7,
            from_user_id: "42".to_string(),
            kind: CallSignalKind::IceCandidate,
            payload: json!({"candidate": "a=..."}),
        };
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["type"], "iceCandidate");
        assert_eq!(value["fromUserId"], "42");
    }

    #[test]
    fn outgoing_message_omits_missing_nonce() {
        let body = OutgoingChatMessage {
            chat_id: 7,
            content: "hello".to_string(),
            nonce: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"chatId": 7, "content": "hello"})
        );
    }
}
