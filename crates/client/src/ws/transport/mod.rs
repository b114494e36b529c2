//! Socket boundary between the connection manager and the network.
//!
//! A [`SocketFactory`] opens one text-frame socket per connection attempt and
//! returns its outbound half. Inbound activity flows back through the
//! [`SocketEvents`] handle it was given, stamped with the attempt's
//! generation so the manager can ignore sockets it has already abandoned.

use std::fmt;
use std::sync::Weak;

use url::Url;

use crate::error::TransportError;

mod native;
mod sockjs;

pub use native::WebSocketFactory;

/// Outbound half of an open socket.
pub trait SocketSink: Send {
    /// Queue one text message. Must not block.
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the socket. Further sends fail; no `closed` event is required afterwards.
    fn close(&mut self);
}

/// Opens sockets to the signaling endpoint.
///
/// `open` is called with the manager's state locked: implementations must not
/// deliver events from inside `open` itself, only from their own tasks.
pub trait SocketFactory: Send + Sync + 'static {
    fn open(
        &self,
        request: OpenRequest,
        events: SocketEvents,
    ) -> Result<Box<dyn SocketSink>, TransportError>;
}

/// Everything needed to open one socket.
#[derive(Clone)]
pub struct OpenRequest {
    /// `ws://` or `wss://` endpoint
    pub url: Url,
    /// `Authorization` header value, for transports that can send it on the upgrade
    pub authorization: String,
}

impl fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRequest")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

/// Why a socket went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed on request.
    Normal,
    /// Close frame from the peer.
    Remote { code: u16, reason: String },
    /// I/O or protocol failure.
    Error(String),
    /// The upgrade was refused because of the credentials.
    Unauthorized(String),
}

impl CloseReason {
    pub fn is_auth_failure(&self) -> bool {
        match self {
            CloseReason::Unauthorized(_) => true,
            CloseReason::Remote { reason, .. } => hearth_shared::is_auth_failure(reason),
            CloseReason::Normal | CloseReason::Error(_) => false,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Normal => f.write_str("closed"),
            CloseReason::Remote { code, reason } => write!(f, "closed by peer ({}): {}", code, reason),
            CloseReason::Error(e) => write!(f, "socket error: {}", e),
            CloseReason::Unauthorized(e) => write!(f, "unauthorized: {}", e),
        }
    }
}

impl From<TransportError> for CloseReason {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unauthorized(reason) => CloseReason::Unauthorized(reason),
            other => CloseReason::Error(other.to_string()),
        }
    }
}

/// Something that happened on a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The socket is ready for the STOMP handshake.
    Opened,
    /// One inbound text payload (zero or more STOMP frames).
    Text(String),
    Closed(CloseReason),
}

/// Receiver of socket events, implemented by the connection manager.
pub(crate) trait SocketEventHandler: Send + Sync {
    fn on_socket_event(&self, generation: u64, event: SocketEvent);
}

/// Handle a socket implementation uses to report back to its manager.
///
/// Holds only a weak reference: events reported after the manager is dropped
/// are discarded.
#[derive(Clone)]
pub struct SocketEvents {
    handler: Weak<dyn SocketEventHandler>,
    generation: u64,
}

impl SocketEvents {
    pub(crate) fn new(handler: Weak<dyn SocketEventHandler>, generation: u64) -> Self {
        Self {
            handler,
            generation,
        }
    }

    /// Connection attempt this handle belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn opened(&self) {
        self.emit(SocketEvent::Opened);
    }

    pub fn text(&self, text: &str) {
        self.emit(SocketEvent::Text(text.to_string()));
    }

    pub fn closed(&self, reason: CloseReason) {
        self.emit(SocketEvent::Closed(reason));
    }

    fn emit(&self, event: SocketEvent) {
        if let Some(handler) = self.handler.upgrade() {
            handler.on_socket_event(self.generation, event);
        }
    }
}

impl fmt::Debug for SocketEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketEvents")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
