//! Typed helpers for the Hearth topics and destinations.

use hearth_shared::{
    call_topic, chat_topic, notifications_topic, typing_topic, CallSignal, CallSignalKind,
    ChatMessage, Notification, OutgoingChatMessage, TypingIndicator, DEST_CALL,
    DEST_SEND_MESSAGE, DEST_TYPING,
};
use serde_json::Value;

use super::manager::{ConnectionManager, SubscriptionHandle};

impl ConnectionManager {
    /// Messages posted to a chat. Subscription id: `chat-{chat_id}`.
    pub fn subscribe_chat<F>(&self, chat_id: i64, callback: F) -> Option<SubscriptionHandle>
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        self.subscribe_json(&chat_topic(chat_id), &format!("chat-{}", chat_id), callback)
    }

    /// Typing indicators for a chat. Subscription id: `typing-{chat_id}`.
    pub fn subscribe_typing<F>(&self, chat_id: i64, callback: F) -> Option<SubscriptionHandle>
    where
        F: Fn(TypingIndicator) + Send + Sync + 'static,
    {
        self.subscribe_json(&typing_topic(chat_id), &format!("typing-{}", chat_id), callback)
    }

    /// Call signaling for a chat. Subscription id: `call-{chat_id}`.
    pub fn subscribe_call<F>(&self, chat_id: i64, callback: F) -> Option<SubscriptionHandle>
    where
        F: Fn(CallSignal) + Send + Sync + 'static,
    {
        self.subscribe_json(&call_topic(chat_id), &format!("call-{}", chat_id), callback)
    }

    /// Notifications of the current user. `None` without credentials.
    pub fn subscribe_notifications<F>(&self, callback: F) -> Option<SubscriptionHandle>
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        let Some(user_id) = self.user_id() else {
            tracing::warn!("cannot subscribe to notifications without credentials");
            return None;
        };
        self.subscribe_json(&notifications_topic(&user_id), "notifications", callback)
    }

    /// Post a chat message with a fresh nonce for matching the echo.
    pub fn send_chat_message(&self, chat_id: i64, content: &str) -> bool {
        let message = OutgoingChatMessage {
            chat_id,
            content: content.to_string(),
            nonce: Some(uuid::Uuid::new_v4().to_string()),
        };
        self.publish(DEST_SEND_MESSAGE, &message)
    }

    pub fn send_typing(&self, chat_id: i64, typing: bool) -> bool {
        let Some(user_id) = self.user_id() else {
            tracing::warn!("cannot send typing indicator without credentials");
            return false;
        };
        let indicator = TypingIndicator {
            chat_id,
            user_id,
            typing,
        };
        self.publish(DEST_TYPING, &indicator)
    }

    /// Forward an opaque signaling payload to the other call participants.
    pub fn send_call_signal(&self, chat_id: i64, kind: CallSignalKind, payload: Value) -> bool {
        let Some(from_user_id) = self.user_id() else {
            tracing::warn!("cannot send call signal without credentials");
            return false;
        };
        let signal = CallSignal {
            chat_id,
            from_user_id,
            kind,
            payload,
        };
        self.publish(DEST_CALL, &signal)
    }
}
