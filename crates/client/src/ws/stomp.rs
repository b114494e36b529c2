//! STOMP session over an open socket.
//!
//! Builds outbound frames, decodes inbound text and classifies what arrived.
//! It holds no connection policy; the manager decides what each event means.

use hearth_shared::{
    Command, Frame, FrameDecoder, ACCEPT_VERSIONS, HEADER_ACCEPT_VERSION, HEADER_AUTHORIZATION,
    HEADER_CONTENT_TYPE, HEADER_DESTINATION, HEADER_HEART_BEAT, HEADER_HOST, HEADER_ID,
    HEADER_MESSAGE, HEADER_RECEIPT_ID, HEADER_SUBSCRIPTION, HEADER_USER_ID, HEADER_VERSION,
    JSON_CONTENT_TYPE, NO_HEART_BEAT,
};

use super::registry::LiveHandle;
use super::transport::SocketSink;
use crate::credentials::Credentials;
use crate::error::TransportError;

/// A MESSAGE frame addressed to one of our subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Live handle id from the `subscription` header, if the server sent one
    pub subscription: Option<String>,
    pub topic: String,
    pub body: String,
}

/// What an inbound frame means to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    Connected { version: Option<String> },
    Message(InboundMessage),
    Error { message: String, body: String },
    Receipt(String),
}

pub struct StompSession {
    sink: Box<dyn SocketSink>,
    decoder: FrameDecoder,
    closed: bool,
}

impl StompSession {
    pub fn new(sink: Box<dyn SocketSink>) -> Self {
        Self {
            sink,
            decoder: FrameDecoder::new(),
            closed: false,
        }
    }

    /// Send the CONNECT frame carrying the bearer token.
    pub fn connect(&mut self, host: &str, credentials: &Credentials) -> Result<(), TransportError> {
        let frame = Frame::new(Command::Connect)
            .header(HEADER_ACCEPT_VERSION, ACCEPT_VERSIONS)
            .header(HEADER_HOST, host)
            .header(HEADER_HEART_BEAT, NO_HEART_BEAT)
            .header(HEADER_AUTHORIZATION, credentials.authorization())
            .header(HEADER_USER_ID, credentials.user_id.as_str());
        self.write(&frame)
    }

    pub fn subscribe(&mut self, live: &LiveHandle, topic: &str) -> Result<(), TransportError> {
        let frame = Frame::new(Command::Subscribe)
            .header(HEADER_ID, live.as_str())
            .header(HEADER_DESTINATION, topic);
        self.write(&frame)
    }

    pub fn unsubscribe(&mut self, live: &LiveHandle) -> Result<(), TransportError> {
        let frame = Frame::new(Command::Unsubscribe).header(HEADER_ID, live.as_str());
        self.write(&frame)
    }

    /// SEND an already serialized JSON body.
    pub fn send(&mut self, destination: &str, json: String) -> Result<(), TransportError> {
        let frame = Frame::new(Command::Send)
            .header(HEADER_DESTINATION, destination)
            .header(HEADER_CONTENT_TYPE, JSON_CONTENT_TYPE)
            .with_body(json);
        self.write(&frame)
    }

    /// Empty SEND used as an application-level heartbeat.
    pub fn ping(&mut self, destination: &str) -> Result<(), TransportError> {
        let frame = Frame::new(Command::Send).header(HEADER_DESTINATION, destination);
        self.write(&frame)
    }

    /// Best-effort DISCONNECT followed by closing the socket.
    pub fn disconnect(&mut self) {
        if let Err(e) = self.write(&Frame::new(Command::Disconnect)) {
            tracing::debug!("DISCONNECT not sent: {}", e);
        }
        self.close();
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.decoder.reset();
            self.sink.close();
        }
    }

    /// Decode socket text into protocol events.
    ///
    /// Malformed frames are dropped and logged; decoding resumes with the next frame.
    pub fn receive(&mut self, text: &str) -> Vec<ProtocolEvent> {
        self.decoder
            .push(text)
            .into_iter()
            .filter_map(|result| match result {
                Ok(frame) => classify(frame),
                Err(e) => {
                    tracing::warn!("dropping malformed STOMP frame: {}", e);
                    None
                }
            })
            .collect()
    }

    fn write(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        tracing::debug!(command = %frame.command, "sending frame");
        self.sink.send_text(frame.encode())
    }
}

fn classify(frame: Frame) -> Option<ProtocolEvent> {
    match frame.command {
        Command::Connected => Some(ProtocolEvent::Connected {
            version: frame.get(HEADER_VERSION).map(str::to_string),
        }),
        Command::Message => {
            let Some(topic) = frame.get(HEADER_DESTINATION).map(str::to_string) else {
                tracing::warn!("dropping MESSAGE without destination");
                return None;
            };
            Some(ProtocolEvent::Message(InboundMessage {
                subscription: frame.get(HEADER_SUBSCRIPTION).map(str::to_string),
                topic,
                body: frame.body,
            }))
        }
        Command::Error => Some(ProtocolEvent::Error {
            message: frame.get(HEADER_MESSAGE).unwrap_or_default().to_string(),
            body: frame.body,
        }),
        Command::Receipt => Some(ProtocolEvent::Receipt(
            frame.get(HEADER_RECEIPT_ID).unwrap_or_default().to_string(),
        )),
        other => {
            tracing::debug!(command = %other, "ignoring client-only frame from server");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl SocketSink for RecordingSink {
        fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    fn session() -> (StompSession, RecordingSink) {
        let sink = RecordingSink::default();
        (StompSession::new(Box::new(sink.clone())), sink)
    }

    fn sent_frames(sink: &RecordingSink) -> Vec<Frame> {
        sink.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| Frame::parse(text).unwrap())
            .collect()
    }

    #[test]
    fn connect_frame_carries_bearer_token() {
        let (mut session, sink) = session();
        session
            .connect("hearth.social", &Credentials::new("T", "42"))
            .unwrap();

        let frames = sent_frames(&sink);
        assert_eq!(frames[0].command, Command::Connect);
        assert_eq!(frames[0].get("Authorization"), Some("Bearer T"));
        assert_eq!(frames[0].get("user-id"), Some("42"));
        assert_eq!(frames[0].get("accept-version"), Some("1.2,1.1,1.0"));
        assert_eq!(frames[0].get("host"), Some("hearth.social"));
    }

    #[test]
    fn subscribe_frames_carry_live_handle() {
        let (mut session, sink) = session();
        let live = LiveHandle::new("chat-7#1");
        session.subscribe(&live, "/topic/chat/7").unwrap();
        session.unsubscribe(&live).unwrap();

        let frames = sent_frames(&sink);
        assert_eq!(frames[0].command, Command::Subscribe);
        assert_eq!(frames[0].get("id"), Some("chat-7#1"));
        assert_eq!(frames[0].get("destination"), Some("/topic/chat/7"));
        assert_eq!(frames[1].command, Command::Unsubscribe);
        assert_eq!(frames[1].get("id"), Some("chat-7#1"));
    }

    #[test]
    fn send_sets_json_content_type() {
        let (mut session, sink) = session();
        session.send("/app/typing", "{\"typing\":true}".to_string()).unwrap();

        let frame = &sent_frames(&sink)[0];
        assert_eq!(frame.command, Command::Send);
        assert_eq!(frame.get("content-type"), Some("application/json"));
        assert_eq!(frame.body, "{\"typing\":true}");
    }

    #[test]
    fn writes_fail_after_close() {
        let (mut session, sink) = session();
        session.disconnect();
        assert!(*sink.closed.lock().unwrap());
        assert_eq!(sent_frames(&sink)[0].command, Command::Disconnect);
        assert!(matches!(session.ping("/app/ping"), Err(TransportError::Closed)));
    }

    #[test]
    fn classifies_inbound_frames() {
        let (mut session, _sink) = session();
        let text = format!(
            "{}{}\n{}",
            Frame::new(Command::Connected).header("version", "1.2").encode(),
            Frame::new(Command::Message)
                .header("subscription", "chat-7#1")
                .header("destination", "/topic/chat/7")
                .with_body("{}")
                .encode(),
            Frame::new(Command::Error)
                .header("message", "401 Unauthorized")
                .encode(),
        );

        let events = session.receive(&text);
        assert_eq!(
            events,
            vec![
                ProtocolEvent::Connected {
                    version: Some("1.2".to_string())
                },
                ProtocolEvent::Message(InboundMessage {
                    subscription: Some("chat-7#1".to_string()),
                    topic: "/topic/chat/7".to_string(),
                    body: "{}".to_string(),
                }),
                ProtocolEvent::Error {
                    message: "401 Unauthorized".to_string(),
                    body: String::new(),
                },
            ]
        );
    }

    #[test]
    fn malformed_frame_keeps_surrounding_messages() {
        let (mut session, _sink) = session();
        let message = |live: &str| {
            Frame::new(Command::Message)
                .header("subscription", live)
                .header("destination", "/topic/chat/7")
                .with_body("{}")
                .encode()
        };
        let text = format!("{}BOGUS\n\n\0{}", message("a#1"), message("b#2"));

        let subscriptions: Vec<_> = session
            .receive(&text)
            .into_iter()
            .filter_map(|event| match event {
                ProtocolEvent::Message(m) => m.subscription,
                _ => None,
            })
            .collect();
        assert_eq!(subscriptions, vec!["a#1".to_string(), "b#2".to_string()]);
    }

    #[test]
    fn malformed_text_yields_nothing() {
        let (mut session, _sink) = session();
        assert!(session.receive("NOPE\n\n\0").is_empty());
        assert!(session.receive("\n").is_empty());
    }
}
