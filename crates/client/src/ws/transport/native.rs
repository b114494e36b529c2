//! WebSocket transport using tokio-tungstenite.

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use hearth_shared::{sockjs, SockJsMessage};
use tokio_tungstenite::tungstenite::{
    self, client::IntoClientRequest, http::header::AUTHORIZATION, http::HeaderValue, Message,
};
use tokio_tungstenite::connect_async;
use url::Url;

use super::sockjs::{fetch_info, session_url};
use super::{CloseReason, OpenRequest, SocketEvents, SocketFactory, SocketSink};
use crate::config::{RealtimeConfig, TransportMode};
use crate::error::TransportError;

/// Opens raw WebSocket or SockJS-over-WebSocket sockets.
///
/// Each socket runs in its own tokio task that owns both halves of the stream.
#[derive(Debug, Clone)]
pub struct WebSocketFactory {
    mode: TransportMode,
    info_check: bool,
    http: reqwest::Client,
}

impl WebSocketFactory {
    pub fn new(mode: TransportMode) -> Self {
        Self {
            mode,
            info_check: mode == TransportMode::SockJs,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            info_check: config.sockjs_info_check,
            ..Self::new(config.transport)
        }
    }
}

impl SocketFactory for WebSocketFactory {
    fn open(
        &self,
        request: OpenRequest,
        events: SocketEvents,
    ) -> Result<Box<dyn SocketSink>, TransportError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let (sender, receiver) = unbounded();

        runtime.spawn(run_socket(self.clone(), request, events, receiver));

        Ok(Box::new(WebSocketSink { sender }))
    }
}

enum Outbound {
    Text(String),
    Close,
}

struct WebSocketSink {
    sender: UnboundedSender<Outbound>,
}

impl SocketSink for WebSocketSink {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sender
            .unbounded_send(Outbound::Text(text))
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn close(&mut self) {
        let _ = self.sender.unbounded_send(Outbound::Close);
        self.sender.close_channel();
    }
}

/// Drive one socket until either side closes it.
async fn run_socket(
    factory: WebSocketFactory,
    request: OpenRequest,
    events: SocketEvents,
    mut outbound: UnboundedReceiver<Outbound>,
) {
    let generation = events.generation();

    let url = match factory.resolve_url(&request.url).await {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(generation, "failed to prepare socket: {}", e);
            events.closed(e.into());
            return;
        }
    };

    let ws_request = match build_request(&url, &request, factory.mode) {
        Ok(req) => req,
        Err(e) => {
            events.closed(e.into());
            return;
        }
    };

    let ws_stream = match connect_async(ws_request).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::error!(generation, url = %url, "WebSocket connect failed: {}", e);
            events.closed(classify_connect_error(e));
            return;
        }
    };

    tracing::info!(generation, url = %url, "WebSocket open");
    let (mut write, mut read) = ws_stream.split();

    // SockJS announces readiness with its own `o` frame.
    if factory.mode == TransportMode::Raw {
        events.opened();
    }

    let reason = loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reason) = factory.dispatch_text(text.as_str(), &events) {
                        break reason;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => CloseReason::Remote {
                            code: u16::from(frame.code),
                            reason: frame.reason.as_str().to_string(),
                        },
                        None => CloseReason::Remote { code: 1005, reason: String::new() },
                    };
                }
                Some(Ok(_)) => {
                    // Binary, ping and pong frames carry no STOMP traffic.
                }
                Some(Err(e)) => break CloseReason::Error(e.to_string()),
                None => break CloseReason::Error("stream ended".to_string()),
            },
            command = outbound.next() => match command {
                Some(Outbound::Text(text)) => {
                    let payload = match factory.mode {
                        TransportMode::Raw => text,
                        TransportMode::SockJs => sockjs::encode_send(&text),
                    };
                    if let Err(e) = write.send(Message::Text(payload.into())).await {
                        tracing::error!(generation, "WebSocket send failed: {}", e);
                        break CloseReason::Error(e.to_string());
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break CloseReason::Normal;
                }
            },
        }
    };

    tracing::info!(generation, "WebSocket closed: {}", reason);
    events.closed(reason);
}

impl WebSocketFactory {
    async fn resolve_url(&self, base: &Url) -> Result<Url, TransportError> {
        match self.mode {
            TransportMode::Raw => Ok(base.clone()),
            TransportMode::SockJs => {
                if self.info_check {
                    let info = fetch_info(&self.http, base).await?;
                    if !info.websocket {
                        return Err(TransportError::WebSocketUnsupported);
                    }
                }
                Ok(session_url(base))
            }
        }
    }

    /// Hand inbound text to the manager. Returns a close reason when the
    /// SockJS layer closed the session.
    fn dispatch_text(&self, text: &str, events: &SocketEvents) -> Option<CloseReason> {
        if self.mode == TransportMode::Raw {
            events.text(text);
            return None;
        }

        match SockJsMessage::parse(text) {
            Ok(SockJsMessage::Open) => events.opened(),
            Ok(SockJsMessage::Heartbeat) => {}
            Ok(SockJsMessage::Messages(messages)) => {
                for message in messages {
                    events.text(&message);
                }
            }
            Ok(SockJsMessage::Close { code, reason }) => {
                return Some(CloseReason::Remote { code, reason });
            }
            Err(e) => tracing::warn!("dropping malformed SockJS message: {}", e),
        }
        None
    }
}

fn build_request(
    url: &Url,
    request: &OpenRequest,
    mode: TransportMode,
) -> Result<tungstenite::handshake::client::Request, TransportError> {
    let mut ws_request = url.as_str().into_client_request()?;

    // SockJS servers ignore upgrade headers; the STOMP CONNECT frame carries auth.
    if mode == TransportMode::Raw {
        let value = HeaderValue::from_str(&request.authorization)
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        ws_request.headers_mut().insert(AUTHORIZATION, value);
    }

    Ok(ws_request)
}

fn classify_connect_error(err: tungstenite::Error) -> CloseReason {
    match &err {
        tungstenite::Error::Http(response)
            if response.status().as_u16() == 401 || response.status().as_u16() == 403 =>
        {
            CloseReason::Unauthorized(format!("HTTP {}", response.status()))
        }
        _ => CloseReason::Error(err.to_string()),
    }
}
