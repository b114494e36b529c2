//! Real-time transport configuration.

use std::str::FromStr;
use std::time::Duration;

use hearth_shared::{is_local_address, DEST_PING};
use url::Url;

use crate::error::{ConfigError, ConnectError};
use crate::ws::ReconnectConfig;

/// How the socket to the signaling endpoint is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Plain WebSocket; each text message is STOMP.
    Raw,
    /// SockJS websocket transport; STOMP frames are wrapped in SockJS arrays.
    SockJs,
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "websocket" | "ws" => Ok(TransportMode::Raw),
            "sockjs" => Ok(TransportMode::SockJs),
            other => Err(ConfigError::InvalidValue {
                var: "HEARTH_WS_TRANSPORT".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// What `subscribe` does while the connection is not established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingSubscriptions {
    /// Return no handle and log a warning.
    #[default]
    Reject,
    /// Register the subscription and issue it once connected.
    Queue,
}

/// Configuration for one connection manager.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Signaling endpoint, e.g. `https://api.example.com/ws` or `localhost:8080/ws`
    pub endpoint: String,
    pub transport: TransportMode,
    /// Query `<endpoint>/info` before opening a SockJS session
    pub sockjs_info_check: bool,
    pub heartbeat_interval: Duration,
    pub ping_destination: String,
    /// Time allowed from opening the socket to the STOMP CONNECTED frame
    pub connect_timeout: Duration,
    /// Explicit `connect()` calls closer together than this are ignored
    pub min_connect_interval: Duration,
    pub reconnect: ReconnectConfig,
    pub pending_subscriptions: PendingSubscriptions,
    /// Bound of the queue behind `subscribe_channel`
    pub inbound_queue_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/ws".to_string(),
            transport: TransportMode::SockJs,
            sockjs_info_check: true,
            heartbeat_interval: Duration::from_secs(30),
            ping_destination: DEST_PING.to_string(),
            connect_timeout: Duration::from_secs(10),
            min_connect_interval: Duration::from_secs(1),
            reconnect: ReconnectConfig::default(),
            pending_subscriptions: PendingSubscriptions::Reject,
            inbound_queue_capacity: 256,
        }
    }
}

impl RealtimeConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_transport(mut self, transport: TransportMode) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_min_connect_interval(mut self, interval: Duration) -> Self {
        self.min_connect_interval = interval;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_pending_subscriptions(mut self, policy: PendingSubscriptions) -> Self {
        self.pending_subscriptions = policy;
        self
    }

    pub fn with_sockjs_info_check(mut self, enabled: bool) -> Self {
        self.sockjs_info_check = enabled;
        self
    }

    /// Parse configuration from environment variables.
    ///
    /// Environment variables:
    /// - `HEARTH_WS_URL`: signaling endpoint (default: "http://localhost:8080/ws")
    /// - `HEARTH_WS_TRANSPORT`: "sockjs" | "raw" (default: "sockjs")
    /// - `HEARTH_SOCKJS_INFO`: "true" | "false" (default: "true")
    /// - `HEARTH_HEARTBEAT_SECS`: ping interval in seconds (default: 30)
    /// - `HEARTH_CONNECT_TIMEOUT_SECS`: handshake timeout in seconds (default: 10)
    /// - `HEARTH_MAX_RECONNECT_ATTEMPTS`: retry cap (default: 10)
    /// - `HEARTH_QUEUE_SUBSCRIPTIONS`: "true" queues subscriptions made before connecting
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`RealtimeConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("HEARTH_WS_URL") {
            config.endpoint = url;
        }
        if let Some(mode) = lookup("HEARTH_WS_TRANSPORT") {
            config.transport = mode.parse()?;
        }
        if let Some(flag) = lookup("HEARTH_SOCKJS_INFO") {
            config.sockjs_info_check = parse_flag("HEARTH_SOCKJS_INFO", &flag)?;
        }
        if let Some(secs) = lookup("HEARTH_HEARTBEAT_SECS") {
            config.heartbeat_interval = Duration::from_secs(parse_number("HEARTH_HEARTBEAT_SECS", &secs)?);
        }
        if let Some(secs) = lookup("HEARTH_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout =
                Duration::from_secs(parse_number("HEARTH_CONNECT_TIMEOUT_SECS", &secs)?);
        }
        if let Some(max) = lookup("HEARTH_MAX_RECONNECT_ATTEMPTS") {
            let max = parse_number("HEARTH_MAX_RECONNECT_ATTEMPTS", &max)?;
            config.reconnect.max_attempts =
                u32::try_from(max).map_err(|_| ConfigError::InvalidValue {
                    var: "HEARTH_MAX_RECONNECT_ATTEMPTS".to_string(),
                    value: max.to_string(),
                })?;
        }
        if let Some(flag) = lookup("HEARTH_QUEUE_SUBSCRIPTIONS") {
            if parse_flag("HEARTH_QUEUE_SUBSCRIPTIONS", &flag)? {
                config.pending_subscriptions = PendingSubscriptions::Queue;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "heartbeat interval must be > 0".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid("connect timeout must be > 0".to_string()));
        }
        if self.inbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "inbound queue capacity must be > 0".to_string(),
            ));
        }
        self.reconnect.validate()
    }

    /// Resolve the configured endpoint to a `ws://` or `wss://` URL.
    ///
    /// `http(s)` schemes are rewritten; a bare host gets `ws://` when it is a
    /// local address and `wss://` otherwise.
    pub fn endpoint_url(&self) -> Result<Url, ConnectError> {
        let raw = self.endpoint.trim();
        if raw.is_empty() {
            return Err(ConnectError::InvalidEndpoint("empty endpoint".to_string()));
        }

        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            let host = raw.split('/').next().unwrap_or(raw);
            if is_local_address(host) {
                format!("ws://{}", raw)
            } else {
                format!("wss://{}", raw)
            }
        };

        let mut url =
            Url::parse(&with_scheme).map_err(|e| ConnectError::InvalidEndpoint(e.to_string()))?;
        let ws_scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ConnectError::InvalidEndpoint(format!(
                    "unsupported scheme `{}`",
                    other
                )))
            }
        };
        url.set_scheme(ws_scheme)
            .map_err(|_| ConnectError::InvalidEndpoint(with_scheme.clone()))?;
        Ok(url)
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_number(var: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}
