//! Hearth Client - real-time transport
//!
//! Connection management for the Hearth social network: chat messages,
//! typing indicators, call signaling and notifications over one STOMP
//! connection carried by WebSocket or SockJS.

pub mod config;
pub mod credentials;
pub mod error;
pub mod ws;

pub use config::{PendingSubscriptions, RealtimeConfig, TransportMode};
pub use credentials::Credentials;
pub use error::{ConfigError, ConnectError, TransportError};
pub use ws::{
    ConnectOutcome, ConnectionEvent, ConnectionManager, ConnectionState, ReconnectConfig,
    SubscriptionHandle, TerminationReason,
};
