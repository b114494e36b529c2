//! SockJS framing for the websocket transport.
//!
//! Server → client messages are prefixed by a single type character:
//! `o` open, `h` heartbeat, `a` a JSON array of payloads, `c` a JSON
//! `[code, reason]` close. Client → server messages are JSON arrays of strings.

use serde::Deserialize;

use crate::error::FrameError;

/// A decoded server → client SockJS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsMessage {
    Open,
    Heartbeat,
    Messages(Vec<String>),
    Close { code: u16, reason: String },
}

impl SockJsMessage {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| FrameError::SockJs("empty message".to_string()))?;
        let rest = chars.as_str();

        match kind {
            'o' => Ok(SockJsMessage::Open),
            'h' => Ok(SockJsMessage::Heartbeat),
            'a' => serde_json::from_str::<Vec<String>>(rest)
                .map(SockJsMessage::Messages)
                .map_err(|e| FrameError::SockJs(e.to_string())),
            'c' => {
                let (code, reason) = serde_json::from_str::<(u16, String)>(rest)
                    .map_err(|e| FrameError::SockJs(e.to_string()))?;
                Ok(SockJsMessage::Close { code, reason })
            }
            other => Err(FrameError::SockJs(format!("unknown frame type `{}`", other))),
        }
    }
}

/// Wrap one outbound payload in the SockJS client envelope.
pub fn encode_send(payload: &str) -> String {
    // Serializing a slice of strings cannot fail.
    serde_json::to_string(&[payload]).unwrap_or_else(|_| String::from("[]"))
}

/// Response body of `GET <base>/info`.
#[derive(Debug, Clone, Deserialize)]
pub struct SockJsInfo {
    #[serde(default = "default_true")]
    pub websocket: bool,
    #[serde(default)]
    pub cookie_needed: bool,
    #[serde(default)]
    pub entropy: u64,
}

fn default_true() -> bool {
    true
}
