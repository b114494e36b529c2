//! Real-time transport for chat, typing, call signaling and notifications.
//!
//! This module provides:
//! - One STOMP connection per session with reconnect (exponential backoff + jitter)
//! - A subscription registry that survives reconnects
//! - Application-level heartbeat and a handshake timeout
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 ConnectionManager                   │
//! │   (state machine, reconnect policy, public API)     │
//! └─────────────────────────────────────────────────────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//!  ┌────────────┐   ┌──────────────┐   ┌────────────┐
//!  │Subscription│   │ StompSession │   │ heartbeat  │
//!  │ Registry   │   │ (frames)     │   │ + timers   │
//!  └────────────┘   └──────────────┘   └────────────┘
//!                          │
//!                          ▼
//!               ┌─────────────────────┐
//!               │   SocketFactory     │
//!               │ (raw WS or SockJS)  │
//!               └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let manager = ConnectionManager::with_websocket(RealtimeConfig::from_env()?)?;
//! manager.set_credentials(Some(Credentials::new(token, user_id)));
//! manager.connect()?;
//!
//! // later, once connected
//! manager.subscribe_chat(7, |message| println!("{}", message.content));
//! manager.send_chat_message(7, "hi");
//! ```

mod channels;
mod connection;
mod heartbeat;
mod manager;
mod registry;
mod stomp;
mod transport;

pub use connection::{
    ConnectOutcome, ConnectionEvent, ConnectionState, ReconnectConfig, TerminationReason,
};
pub use manager::{ConnectionManager, SubscriptionHandle};
pub use registry::{LiveHandle, MessageCallback, SubscriptionEntry, SubscriptionRegistry};
pub use stomp::{InboundMessage, ProtocolEvent, StompSession};
pub use transport::{
    CloseReason, OpenRequest, SocketEvent, SocketEvents, SocketFactory, SocketSink,
    WebSocketFactory,
};
