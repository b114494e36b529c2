//! The connection manager: one STOMP connection per session.
//!
//! Every public operation and every socket or timer event goes through the
//! same `Mutex<Inner>`. Subscriber callbacks run after the lock is released,
//! so they may call back into the manager.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError, UnboundedReceiver, UnboundedSender};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use super::connection::{
    ConnectOutcome, ConnectionEvent, ConnectionState, TerminationReason,
};
use super::heartbeat::spawn_heartbeat;
use super::registry::{LiveHandle, MessageCallback, SubscriptionRegistry};
use super::stomp::{InboundMessage, ProtocolEvent, StompSession};
use super::transport::{
    CloseReason, OpenRequest, SocketEvent, SocketEventHandler, SocketEvents, SocketFactory,
    WebSocketFactory,
};
use crate::config::{PendingSubscriptions, RealtimeConfig};
use crate::credentials::Credentials;
use crate::error::{ConfigError, ConnectError};

/// What `subscribe` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: String,
    pub topic: String,
    /// `None` while the subscription is queued for the next connection
    pub live: Option<LiveHandle>,
}

/// Cloneable handle to one managed connection.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    factory: Arc<dyn SocketFactory>,
    config: RealtimeConfig,
    /// Runtime the manager was created on; timers go here even when socket
    /// events arrive from other threads.
    runtime: Option<Handle>,
    this: Weak<Shared>,
}

struct Inner {
    credentials: Option<Credentials>,
    state: ConnectionState,
    reconnect_attempts: u32,
    last_connect_attempt: Option<Instant>,
    /// Bumped whenever a socket is opened or abandoned
    generation: u64,
    endpoint: Option<Url>,
    session: Option<StompSession>,
    registry: SubscriptionRegistry,
    /// Sequence for live handle ids, never reset so ids stay unique across sockets
    live_seq: u64,
    heartbeat: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    connect_timer: Option<JoinHandle<()>>,
    listeners: Vec<UnboundedSender<ConnectionEvent>>,
}

/// A decoded-later payload bound for one callback.
struct Delivery {
    callback: MessageCallback,
    topic: String,
    body: String,
}

impl ConnectionManager {
    pub fn new(config: RealtimeConfig, factory: impl SocketFactory) -> Result<Self, ConfigError> {
        Self::with_factory(config, Arc::new(factory))
    }

    /// Manager backed by tokio-tungstenite in the configured transport mode.
    pub fn with_websocket(config: RealtimeConfig) -> Result<Self, ConfigError> {
        let factory = WebSocketFactory::from_config(&config);
        Self::new(config, factory)
    }

    /// Fails if `config` does not pass [`RealtimeConfig::validate`].
    pub fn with_factory(
        config: RealtimeConfig,
        factory: Arc<dyn SocketFactory>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let shared = Arc::new_cyclic(|this| Shared {
            inner: Mutex::new(Inner::new()),
            factory,
            config,
            runtime: Handle::try_current().ok(),
            this: this.clone(),
        });
        Ok(Self { shared })
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.shared.config
    }

    /// Replace the credentials used for the next handshake.
    ///
    /// `None` (or a blank token) deactivates the connection like `disconnect`.
    /// New credentials do not reconnect by themselves; call `connect` again.
    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        let credentials = credentials.filter(Credentials::is_usable);
        let mut inner = self.shared.lock();
        match credentials {
            Some(credentials) => {
                tracing::debug!(user_id = %credentials.user_id, "credentials updated");
                inner.credentials = Some(credentials);
            }
            None => {
                tracing::info!("credentials cleared, deactivating connection");
                inner.credentials = None;
                inner.deactivate();
            }
        }
    }

    /// User id of the current credentials.
    pub fn user_id(&self) -> Option<String> {
        self.shared
            .lock()
            .credentials
            .as_ref()
            .map(|c| c.user_id.clone())
    }

    /// Start connecting. Returns immediately; progress is reported through
    /// [`ConnectionManager::events`] and [`ConnectionManager::state`].
    pub fn connect(&self) -> Result<ConnectOutcome, ConnectError> {
        let shared = &self.shared;
        let mut inner = shared.lock();

        if inner.state.is_connected() || inner.state.is_connecting() {
            tracing::debug!(state = ?inner.state, "connect ignored, already active");
            return Ok(ConnectOutcome::AlreadyActive);
        }

        if !inner.credentials.as_ref().is_some_and(Credentials::is_usable) {
            tracing::warn!("connect refused: no credentials, re-authentication required");
            return Err(ConnectError::MissingCredentials);
        }

        if let Some(last) = inner.last_connect_attempt {
            if last.elapsed() < shared.config.min_connect_interval {
                tracing::debug!("connect debounced");
                return Ok(ConnectOutcome::Debounced);
            }
        }

        let endpoint = shared.config.endpoint_url()?;
        inner.endpoint = Some(endpoint);
        inner.reconnect_attempts = 0;
        inner.cancel_reconnect();
        shared.open_socket(&mut inner);
        Ok(ConnectOutcome::Started)
    }

    /// Unsubscribe everything, send DISCONNECT and close the socket.
    ///
    /// Best effort: nothing waits for the server. The registry is emptied.
    pub fn disconnect(&self) {
        let mut inner = self.shared.lock();
        tracing::info!("disconnect requested");
        inner.deactivate();
    }

    /// Subscribe `topic` under the caller-chosen `id`.
    ///
    /// An existing subscription with the same id is replaced and its live
    /// handle released. Returns `None` when the manager is not connected
    /// (unless pending subscriptions are queued) or the arguments are empty.
    pub fn subscribe<F>(&self, topic: &str, id: &str, callback: F) -> Option<SubscriptionHandle>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.subscribe_with(topic, id, Arc::new(callback))
    }

    /// Like [`ConnectionManager::subscribe`] with payloads decoded into `T`.
    ///
    /// Payloads that do not match `T` are logged and dropped.
    pub fn subscribe_json<T, F>(&self, topic: &str, id: &str, callback: F) -> Option<SubscriptionHandle>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let topic_name = topic.to_string();
        self.subscribe(topic, id, move |value| match serde_json::from_value::<T>(value) {
            Ok(payload) => callback(payload),
            Err(e) => tracing::warn!(topic = %topic_name, "dropping payload of unexpected shape: {}", e),
        })
    }

    /// Subscribe with payloads pushed into a bounded queue instead of a callback.
    ///
    /// When the receiver falls behind by `inbound_queue_capacity` payloads the
    /// newest one is dropped with a warning.
    pub fn subscribe_channel(
        &self,
        topic: &str,
        id: &str,
    ) -> Option<(SubscriptionHandle, mpsc::Receiver<Value>)> {
        let (tx, rx) = mpsc::channel(self.shared.config.inbound_queue_capacity);
        let topic_name = topic.to_string();
        let handle = self.subscribe(topic, id, move |value| match tx.try_send(value) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(topic = %topic_name, "subscriber queue full, dropping payload")
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(topic = %topic_name, "subscriber queue closed")
            }
        })?;
        Some((handle, rx))
    }

    fn subscribe_with(
        &self,
        topic: &str,
        id: &str,
        callback: MessageCallback,
    ) -> Option<SubscriptionHandle> {
        if id.trim().is_empty() || topic.trim().is_empty() {
            tracing::warn!(id, topic, "subscribe needs a non-empty id and topic");
            return None;
        }

        let mut inner = self.shared.lock();
        let Inner {
            state,
            session,
            registry,
            live_seq,
            ..
        } = &mut *inner;

        if let (ConnectionState::Connected, Some(session)) = (*state, session.as_mut()) {
            if let Some(previous) = registry.upsert(id, topic, callback) {
                if let Err(e) = session.unsubscribe(&previous) {
                    tracing::warn!(id, "failed to release previous subscription: {}", e);
                }
            }
            let live = issue_live(live_seq, id);
            return match session.subscribe(&live, topic) {
                Ok(()) => {
                    tracing::debug!(id, topic, live = %live, "subscribed");
                    registry.attach(id, live.clone());
                    Some(SubscriptionHandle {
                        id: id.to_string(),
                        topic: topic.to_string(),
                        live: Some(live),
                    })
                }
                Err(e) => {
                    tracing::warn!(id, topic, "subscribe failed: {}", e);
                    registry.remove(id);
                    None
                }
            };
        }

        match self.shared.config.pending_subscriptions {
            PendingSubscriptions::Queue => {
                registry.upsert(id, topic, callback);
                tracing::debug!(id, topic, state = ?state, "subscription queued until connected");
                Some(SubscriptionHandle {
                    id: id.to_string(),
                    topic: topic.to_string(),
                    live: None,
                })
            }
            PendingSubscriptions::Reject => {
                tracing::warn!(id, topic, state = ?state, "cannot subscribe while not connected");
                None
            }
        }
    }

    /// Release the subscription registered under `id`. Unknown ids are ignored.
    ///
    /// While disconnected no frame is sent, but the entry is forgotten and
    /// will not be re-issued on the next connection.
    pub fn unsubscribe(&self, id: &str) {
        let mut inner = self.shared.lock();
        let Inner {
            state,
            session,
            registry,
            ..
        } = &mut *inner;

        let Some(entry) = registry.remove(id) else {
            tracing::debug!(id, "unsubscribe of unknown id ignored");
            return;
        };

        if let (ConnectionState::Connected, Some(session), Some(live)) =
            (*state, session.as_mut(), entry.live.as_ref())
        {
            if let Err(e) = session.unsubscribe(live) {
                tracing::warn!(id, "unsubscribe failed: {}", e);
                return;
            }
        }
        tracing::debug!(id, topic = %entry.topic, "unsubscribed");
    }

    /// Serialize `body` as JSON and SEND it to `destination`.
    ///
    /// Returns `false` when not connected or when encoding or sending fails.
    pub fn publish<T>(&self, destination: &str, body: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        if destination.trim().is_empty() {
            tracing::warn!("publish needs a non-empty destination");
            return false;
        }

        let mut inner = self.shared.lock();
        let state = inner.state;
        let Some(session) = inner.session.as_mut().filter(|_| state.is_connected()) else {
            tracing::warn!(destination, state = ?state, "cannot publish while not connected");
            return false;
        };

        let json = match serde_json::to_string(body) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(destination, "failed to encode body: {}", e);
                return false;
            }
        };

        match session.send(destination, json) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(destination, "publish failed: {}", e);
                false
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().reconnect_attempts
    }

    /// Ids of all registered subscriptions, live or waiting to be re-issued.
    pub fn subscription_ids(&self) -> Vec<String> {
        self.shared.lock().registry.ids()
    }

    /// New receiver of every subsequent [`ConnectionEvent`].
    pub fn events(&self) -> UnboundedReceiver<ConnectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.lock().listeners.push(tx);
        rx
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("ConnectionManager")
            .field("state", &inner.state)
            .field("reconnect_attempts", &inner.reconnect_attempts)
            .field("subscriptions", &inner.registry.len())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handler(&self) -> Weak<dyn SocketEventHandler> {
        self.this.clone()
    }

    /// Replace whatever socket exists with a fresh one for the stored endpoint.
    fn open_socket(&self, inner: &mut Inner) {
        let (Some(endpoint), Some(credentials)) = (inner.endpoint.clone(), inner.credentials.clone())
        else {
            tracing::warn!("cannot open socket without endpoint and credentials");
            return;
        };

        inner.retire_socket();
        let generation = inner.generation;
        inner.last_connect_attempt = Some(Instant::now());
        inner.set_state(ConnectionState::Connecting);

        tracing::info!(generation, url = %endpoint, attempt = inner.reconnect_attempts, "opening socket");
        let request = OpenRequest {
            url: endpoint,
            authorization: credentials.authorization(),
        };
        let events = SocketEvents::new(self.handler(), generation);

        match self.factory.open(request, events) {
            Ok(sink) => {
                inner.session = Some(StompSession::new(sink));
                let timeout = self.config.connect_timeout;
                inner.connect_timer = self.spawn_timer(timeout, move |shared| {
                    shared.connect_timed_out(generation)
                });
            }
            Err(e) => {
                tracing::error!(generation, "failed to open socket: {}", e);
                self.socket_lost(inner, CloseReason::from(e));
            }
        }
    }

    /// Decode and hand each payload to its callback. Runs without the lock.
    ///
    /// A subscription released by an earlier callback in the same batch is
    /// skipped.
    fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            if !self.is_active(&delivery.callback) {
                tracing::debug!(topic = %delivery.topic, "subscription released before delivery");
                continue;
            }
            let payload = if delivery.body.trim().is_empty() {
                Value::Null
            } else {
                match serde_json::from_str::<Value>(&delivery.body) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(topic = %delivery.topic, "dropping malformed payload: {}", e);
                        continue;
                    }
                }
            };
            (delivery.callback)(payload);
        }
    }

    fn is_active(&self, callback: &MessageCallback) -> bool {
        let inner = self.lock();
        let active = inner
            .registry
            .values()
            .any(|entry| entry.live.is_some() && same_callback(&entry.callback, callback));
        active
    }

    /// Sleep for `delay`, then run `action` if the manager still exists.
    fn spawn_timer<F>(&self, delay: Duration, action: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Arc<Shared>) + Send + 'static,
    {
        let this = self.this.clone();
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = this.upgrade() {
                action(shared);
            }
        })
    }

    fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    fn spawn<F>(&self, future: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.runtime() {
            Some(runtime) => Some(runtime.spawn(future)),
            None => {
                tracing::error!("no tokio runtime, timer not started");
                None
            }
        }
    }

    fn connect_timed_out(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.state.is_connecting() {
            return;
        }
        inner.connect_timer.take();
        tracing::warn!(
            generation,
            timeout = ?self.config.connect_timeout,
            "handshake did not complete in time"
        );
        self.socket_lost(&mut inner, CloseReason::Error("connect timeout".to_string()));
    }

    fn reconnect_due(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != ConnectionState::Disconnected {
            return;
        }
        inner.reconnect_timer.take();
        self.open_socket(&mut inner);
    }

    fn send_ping(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.state.is_connected() {
            return false;
        }
        let Some(session) = inner.session.as_mut() else {
            return false;
        };
        if let Err(e) = session.ping(&self.config.ping_destination) {
            tracing::warn!(generation, "heartbeat ping failed: {}", e);
        }
        true
    }

    /// Non-explicit loss of the socket: keep subscriptions, maybe retry.
    fn socket_lost(&self, inner: &mut Inner, reason: CloseReason) {
        if reason.is_auth_failure() {
            self.authentication_failed(inner, reason.to_string());
            return;
        }

        tracing::warn!(state = ?inner.state, "connection lost: {}", reason);
        inner.retire_socket();
        inner.registry.release_live();
        inner.set_state(ConnectionState::Disconnected);

        let policy = &self.config.reconnect;
        if inner.reconnect_attempts >= policy.max_attempts {
            tracing::error!(
                attempts = inner.reconnect_attempts,
                "giving up after {} reconnect attempts",
                policy.max_attempts
            );
            inner.set_state(ConnectionState::Terminated(TerminationReason::RetriesExhausted));
            return;
        }

        let delay = policy.delay_for_attempt(inner.reconnect_attempts);
        inner.reconnect_attempts += 1;
        let attempt = inner.reconnect_attempts;
        let generation = inner.generation;
        tracing::info!(attempt, delay = ?delay, "reconnect scheduled");
        inner.emit(ConnectionEvent::ReconnectScheduled { attempt, delay });
        inner.reconnect_timer =
            self.spawn_timer(delay, move |shared| shared.reconnect_due(generation));
    }

    /// Terminal: forget subscriptions and credentials, tell the session owner once.
    fn authentication_failed(&self, inner: &mut Inner, reason: String) {
        if inner.state == ConnectionState::Terminated(TerminationReason::AuthenticationFailed) {
            return;
        }
        tracing::error!("authentication rejected: {}", reason);
        inner.retire_socket();
        inner.cancel_reconnect();
        inner.registry.clear_all();
        inner.credentials = None;
        inner.reconnect_attempts = 0;
        inner.set_state(ConnectionState::Terminated(TerminationReason::AuthenticationFailed));
        inner.emit(ConnectionEvent::AuthenticationFailed { reason });
    }

    fn on_opened(&self, inner: &mut Inner) {
        if !inner.state.is_connecting() {
            return;
        }
        let host = inner
            .endpoint
            .as_ref()
            .and_then(|url| url.host_str())
            .unwrap_or_default()
            .to_string();
        let result = match (inner.session.as_mut(), inner.credentials.as_ref()) {
            (Some(session), Some(credentials)) => session.connect(&host, credentials),
            _ => return,
        };
        match result {
            Ok(()) => tracing::debug!(generation = inner.generation, "CONNECT sent"),
            Err(e) => self.socket_lost(inner, CloseReason::from(e)),
        }
    }

    /// Apply protocol events in order; returns the payloads to hand to callbacks.
    fn on_protocol_events(&self, inner: &mut Inner, events: Vec<ProtocolEvent>) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        let generation = inner.generation;

        for event in events {
            if inner.generation != generation {
                break;
            }
            match event {
                ProtocolEvent::Connected { version } => self.on_connected(inner, version),
                ProtocolEvent::Message(message) => {
                    if let Some(delivery) = route(inner, message) {
                        deliveries.push(delivery);
                    }
                }
                ProtocolEvent::Error { message, body } => {
                    if hearth_shared::is_auth_failure(&message) || hearth_shared::is_auth_failure(&body) {
                        let reason = if message.is_empty() { body } else { message };
                        self.authentication_failed(inner, reason);
                    } else {
                        self.socket_lost(inner, CloseReason::Error(format!("ERROR frame: {}", message)));
                    }
                }
                ProtocolEvent::Receipt(id) => tracing::debug!(receipt = %id, "receipt"),
            }
        }

        deliveries
    }

    fn on_connected(&self, inner: &mut Inner, version: Option<String>) {
        if !inner.state.is_connecting() {
            tracing::debug!("ignoring CONNECTED outside of handshake");
            return;
        }
        if let Some(timer) = inner.connect_timer.take() {
            timer.abort();
        }

        inner.reconnect_attempts = 0;
        inner.set_state(ConnectionState::Connected);
        tracing::info!(version = version.as_deref().unwrap_or("unknown"), "STOMP session established");

        let Inner {
            session,
            registry,
            live_seq,
            ..
        } = &mut *inner;
        if let Some(session) = session.as_mut() {
            for (id, entry) in registry.snapshot() {
                let live = issue_live(live_seq, &id);
                match session.subscribe(&live, &entry.topic) {
                    Ok(()) => {
                        tracing::debug!(id = %id, topic = %entry.topic, "re-subscribed");
                        registry.attach(&id, live);
                    }
                    Err(e) => tracing::warn!(id = %id, "re-subscribe failed: {}", e),
                }
            }
        }

        let Some(runtime) = self.runtime() else {
            tracing::error!("no tokio runtime, heartbeat not started");
            return;
        };
        let generation = inner.generation;
        let this = self.this.clone();
        inner.heartbeat = Some(spawn_heartbeat(&runtime, self.config.heartbeat_interval, move || {
            this.upgrade()
                .is_some_and(|shared| shared.send_ping(generation))
        }));
    }
}

impl SocketEventHandler for Shared {
    fn on_socket_event(&self, generation: u64, event: SocketEvent) {
        let deliveries = {
            let mut inner = self.lock();
            if generation != inner.generation || inner.session.is_none() {
                tracing::trace!(generation, "ignoring event from retired socket");
                return;
            }

            match event {
                SocketEvent::Opened => {
                    self.on_opened(&mut inner);
                    Vec::new()
                }
                SocketEvent::Text(text) => {
                    let events = match inner.session.as_mut() {
                        Some(session) => session.receive(&text),
                        None => Vec::new(),
                    };
                    self.on_protocol_events(&mut inner, events)
                }
                SocketEvent::Closed(reason) => {
                    self.socket_lost(&mut inner, reason);
                    Vec::new()
                }
            }
        };

        self.deliver(deliveries);
    }
}

impl Inner {
    fn new() -> Self {
        Self {
            credentials: None,
            state: ConnectionState::Idle,
            reconnect_attempts: 0,
            last_connect_attempt: None,
            generation: 0,
            endpoint: None,
            session: None,
            registry: SubscriptionRegistry::new(),
            live_seq: 0,
            heartbeat: None,
            reconnect_timer: None,
            connect_timer: None,
            listeners: Vec::new(),
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::info!(from = ?self.state, to = ?state, "connection state changed");
        self.state = state;
        self.emit(ConnectionEvent::StateChanged(state));
    }

    fn emit(&mut self, event: ConnectionEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Stop timers tied to the current socket and close it. Later events
    /// from that socket carry a stale generation.
    fn retire_socket(&mut self) {
        self.generation += 1;
        for timer in [self.heartbeat.take(), self.connect_timer.take()].into_iter().flatten() {
            timer.abort();
        }
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }

    /// Explicit shutdown: release every subscription on the wire, then drop the socket.
    fn deactivate(&mut self) {
        self.cancel_reconnect();
        let released = self.registry.clear_all();
        if let Some(session) = self.session.as_mut() {
            if self.state.is_connected() {
                for live in &released {
                    if let Err(e) = session.unsubscribe(live) {
                        tracing::debug!(live = %live, "unsubscribe during disconnect failed: {}", e);
                    }
                }
                session.disconnect();
            } else {
                session.close();
            }
        }
        self.retire_socket();
        self.reconnect_attempts = 0;
        if self.state != ConnectionState::Idle {
            self.set_state(ConnectionState::Disconnected);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_reconnect();
        self.retire_socket();
    }
}

/// `<id>#<seq>`: lets MESSAGE frames for a released handle be told apart.
fn issue_live(seq: &mut u64, id: &str) -> LiveHandle {
    *seq += 1;
    LiveHandle::new(format!("{}#{}", id, seq))
}

fn route(inner: &Inner, message: InboundMessage) -> Option<Delivery> {
    let entry = match message.subscription.as_deref() {
        Some(live) => inner.registry.find_by_live(live),
        None => inner.registry.find_by_topic(&message.topic),
    };

    match entry {
        Some(entry) => Some(Delivery {
            callback: entry.callback.clone(),
            topic: message.topic,
            body: message.body,
        }),
        None => {
            tracing::debug!(
                topic = %message.topic,
                subscription = message.subscription.as_deref().unwrap_or("-"),
                "dropping message for inactive subscription"
            );
            None
        }
    }
}

fn same_callback(a: &MessageCallback, b: &MessageCallback) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
