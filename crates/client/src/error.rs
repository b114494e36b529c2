//! Client-side error types.
//!
//! None of these cross the public publish/subscribe API: transport failures
//! are turned into state transitions and boolean results by the manager.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failure opening, writing to or negotiating a socket.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("no tokio runtime available to drive the socket")]
    NoRuntime,
    #[error("socket is closed")]
    Closed,
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("handshake rejected: {0}")]
    Unauthorized(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("SockJS info request failed: {0}")]
    Info(#[from] reqwest::Error),
    #[error("server does not offer the websocket transport")]
    WebSocketUnsupported,
}

/// Reasons `connect()` refuses to start a connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// No (or an empty) token is present; the caller must log in or refresh first.
    #[error("no credentials available, re-authentication required")]
    MissingCredentials,
    #[error("invalid signaling endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}")]
    InvalidValue { var: String, value: String },
    #[error("{0}")]
    Invalid(String),
}
