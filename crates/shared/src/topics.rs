//! Topic and destination naming.
//!
//! Topics are where the server pushes; destinations are where the client sends.

use std::fmt::Display;

pub const DEST_SEND_MESSAGE: &str = "/app/sendMessage";
pub const DEST_TYPING: &str = "/app/typing";
pub const DEST_CALL: &str = "/app/call";
pub const DEST_PING: &str = "/app/ping";

pub fn chat_topic(chat_id: impl Display) -> String {
    format!("/topic/chat/{}", chat_id)
}

pub fn typing_topic(chat_id: impl Display) -> String {
    format!("/topic/typing/{}", chat_id)
}

pub fn call_topic(chat_id: impl Display) -> String {
    format!("/topic/call/{}", chat_id)
}

pub fn notifications_topic(user_id: impl Display) -> String {
    format!("/topic/notifications/{}", user_id)
}
