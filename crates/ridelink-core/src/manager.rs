//! Connection manager state machine.
//!
//! Owns the single realtime channel: opens it with a freshly fetched token,
//! runs the heartbeat while it is open, schedules bounded reconnects when it
//! drops, and fans every inbound frame and lifecycle change out through the
//! [`Registry`].
//!
//! Like the rest of this crate it is Sans-IO. Timers are deadlines stored in
//! the manager and fired by [`ConnectionManager::tick`]; channel lifecycle
//! arrives through [`ConnectionManager::handle_channel_event`]. A driver
//! supplies both, always from one thread of control.
//!
//! # Detaching a channel
//!
//! Every channel gets a fresh [`ChannelId`]. Teardown forgets the current id,
//! after which anything the old channel still reports is ignored. A late
//! close from a channel we replaced or disconnected therefore cannot emit
//! stale events or start a reconnect.

use ridelink_proto::{
    DriverStatus, EmergencyAlert, EventKind, InboundMessage, Location, MessageType,
    OutboundMessage, Ping, StatusUpdate, TripResponse,
    close::{self, CLIENT_DISCONNECT_REASON, NORMAL_CLOSURE},
    endpoint::redact,
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    backoff::Backoff,
    config::ManagerConfig,
    env::Environment,
    error::{ConnectError, SendError},
    identity::{Identity, Role},
    registry::{Listener, Registry},
    state::ConnectionState,
    token::TokenStore,
    transport::{Channel, ChannelEvent, ChannelId, Connector},
};

struct LiveChannel<Ch> {
    id: ChannelId,
    channel: Ch,
}

/// Realtime connection manager.
///
/// Generic over the environment (time, randomness), the connector that opens
/// channels, and the token store consulted on every attempt.
pub struct ConnectionManager<E: Environment, C: Connector, T: TokenStore> {
    env: E,
    config: ManagerConfig,
    backoff: Backoff,
    connector: C,
    tokens: T,
    identity: Option<Identity>,
    state: ConnectionState,
    live: Option<LiveChannel<C::Channel>>,
    next_channel: u64,
    reconnect_attempts: u32,
    reconnect_due: Option<E::Instant>,
    heartbeat_due: Option<E::Instant>,
    /// Attempt count to report once a reconnect-started channel opens
    resumed_after: Option<u32>,
    registry: Registry,
}

impl<E, C, T> ConnectionManager<E, C, T>
where
    E: Environment,
    C: Connector,
    T: TokenStore,
{
    /// Create an idle manager. Nothing is opened until `initialize` or
    /// `connect`.
    pub fn new(env: E, config: ManagerConfig, connector: C, tokens: T) -> Self {
        let backoff = config.backoff();
        Self {
            env,
            config,
            backoff,
            connector,
            tokens,
            identity: None,
            state: ConnectionState::Idle,
            live: None,
            next_channel: 0,
            reconnect_attempts: 0,
            reconnect_due: None,
            heartbeat_due: None,
            resumed_after: None,
            registry: Registry::new(),
        }
    }

    /// Record who is connecting, then [`connect`](Self::connect).
    pub fn initialize(&mut self, user_id: impl Into<String>, role: Role) -> bool {
        let identity = Identity::new(user_id, role);
        tracing::info!(user_id = %identity.user_id, role = %identity.role, "initializing connection");
        self.identity = Some(identity);
        self.connect()
    }

    /// Tear down any existing channel and timers, then start a new attempt.
    ///
    /// Returns true once the attempt has started; completion is reported
    /// later by a `connect` event. Returns false if no token is available
    /// (state becomes `Failed`, nothing is retried) or if the transport
    /// refused to start (a reconnect is scheduled).
    pub fn connect(&mut self) -> bool {
        match self.establish() {
            Ok(channel) => {
                tracing::debug!(%channel, "connection attempt started");
                true
            },
            Err(err) if err.is_retryable() => {
                tracing::error!(error = %err, "failed to start connection");
                self.schedule_reconnect();
                false
            },
            Err(err) => {
                tracing::error!(error = %err, "cannot connect");
                self.transition(ConnectionState::Failed);
                false
            },
        }
    }

    /// Close the channel on request. No reconnect follows.
    ///
    /// If the channel was open, subscribers get exactly one `disconnect`
    /// event with a normal close code. Subscriptions are kept.
    pub fn disconnect(&mut self) {
        let was_open = self.state.is_open();
        self.teardown();
        self.transition(ConnectionState::Closed);

        if was_open {
            tracing::info!("disconnected");
            self.emit(
                EventKind::Disconnect,
                &json!({ "code": NORMAL_CLOSURE, "reason": CLIENT_DISCONNECT_REASON }),
            );
        }
    }

    /// Feed one event reported by a channel.
    ///
    /// Events from anything but the current channel are dropped.
    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        if self.current_channel() != Some(event.channel()) {
            tracing::debug!(channel = %event.channel(), "ignoring event from detached channel");
            return;
        }

        match event {
            ChannelEvent::Opened { .. } => self.handle_open(),
            ChannelEvent::Message { text, .. } => self.handle_message(&text),
            ChannelEvent::Error { reason, .. } => self.handle_error(&reason),
            ChannelEvent::Closed { code, reason, .. } => self.handle_close(code, &reason),
        }
    }

    /// Fire every timer due at `now`.
    pub fn tick(&mut self, now: E::Instant) {
        if self.reconnect_due.is_some_and(|due| now >= due) {
            self.reconnect_due = None;
            let attempts = self.reconnect_attempts;
            tracing::info!(attempt = attempts, "reconnecting");
            if self.connect() {
                self.resumed_after = Some(attempts);
            }
        }

        if let Some(due) = self.heartbeat_due.filter(|due| now >= *due) {
            if self.state.is_open() {
                self.send_heartbeat(now, due);
            } else {
                self.heartbeat_due = None;
            }
        }
    }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<E::Instant> {
        match (self.reconnect_due, self.heartbeat_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Send a raw message. False if the channel is not open or the write
    /// failed.
    pub fn send(&mut self, kind: MessageType, payload: Value) -> bool {
        let message = OutboundMessage::new(kind, payload);
        let result = self.try_send(&message);
        report(kind, result)
    }

    /// Send a message, reporting why it was not written.
    ///
    /// # Errors
    ///
    /// - `SendError::NotOpen` unless the state is `Open`
    /// - `SendError::Encode` if the message does not serialize
    /// - `SendError::Transport` if the channel rejected the frame
    pub fn try_send(&mut self, message: &OutboundMessage) -> Result<(), SendError> {
        let state = self.state;
        let live = match self.live.as_mut() {
            Some(live) if state.is_open() => live,
            _ => return Err(SendError::NotOpen { kind: message.kind, state }),
        };

        let text = message.encode()?;
        live.channel.send_text(text)?;
        Ok(())
    }

    /// Report the device position.
    pub fn update_location(&mut self, location: &Location) -> bool {
        let result = self.send_payload(MessageType::LocationUpdate, location);
        report(MessageType::LocationUpdate, result)
    }

    /// Change driver availability. Drivers only.
    pub fn update_driver_status(&mut self, status: DriverStatus) -> bool {
        let kind = MessageType::StatusUpdate;
        let result = self
            .require_driver(kind)
            .and_then(|()| self.send_payload(kind, &StatusUpdate { status }));
        report(kind, result)
    }

    /// Accept or decline a trip request. Drivers only.
    pub fn respond_to_trip(&mut self, trip_id: impl Into<String>, accepted: bool) -> bool {
        let kind = MessageType::TripResponse;
        let response = TripResponse { trip_id: trip_id.into(), accepted };
        let result = self.require_driver(kind).and_then(|()| self.send_payload(kind, &response));
        report(kind, result)
    }

    /// Raise an emergency alert. Any role.
    pub fn send_emergency_alert(&mut self, alert: &EmergencyAlert) -> bool {
        let result = self.send_payload(MessageType::EmergencyAlert, alert);
        report(MessageType::EmergencyAlert, result)
    }

    /// Subscribe `listener` to `event`. Subscriptions survive reconnects.
    pub fn add_event_listener(&mut self, event: impl AsRef<str>, listener: Listener) {
        self.registry.add(event.as_ref(), listener);
    }

    /// Unsubscribe `listener` from `event`. Unknown pairs are ignored.
    pub fn remove_event_listener(&mut self, event: impl AsRef<str>, listener: &Listener) {
        self.registry.remove(event.as_ref(), listener);
    }

    /// Listeners currently subscribed to `event`.
    pub fn listener_count(&self, event: impl AsRef<str>) -> usize {
        self.registry.listener_count(event.as_ref())
    }

    /// True while the channel is open.
    pub fn is_connected(&self) -> bool {
        self.state.is_open()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Identity recorded by the last `initialize`.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Reconnect attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Id of the attached channel, if any.
    pub fn current_channel(&self) -> Option<ChannelId> {
        self.live.as_ref().map(|live| live.id)
    }

    /// Active configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Connector used to open channels.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Mutable access to the connector.
    pub fn connector_mut(&mut self) -> &mut C {
        &mut self.connector
    }

    fn establish(&mut self) -> Result<ChannelId, ConnectError> {
        self.teardown();
        self.transition(ConnectionState::Connecting);

        let token = self
            .tokens
            .token()
            .filter(|token| !token.is_empty())
            .ok_or(ConnectError::MissingCredential)?;
        let url = self.config.endpoint.authenticated(&token);

        let id = ChannelId(self.next_channel);
        self.next_channel += 1;

        tracing::info!(%id, url = %redact(&url), "opening channel");
        let channel = self.connector.open(id, &url)?;
        self.live = Some(LiveChannel { id, channel });

        Ok(id)
    }

    /// Cancel timers and detach the current channel, closing it normally if
    /// it was open. Emits nothing.
    fn teardown(&mut self) {
        self.reconnect_due = None;
        self.heartbeat_due = None;
        self.resumed_after = None;

        if let Some(mut live) = self.live.take() {
            if self.state.is_open() {
                live.channel.close(NORMAL_CLOSURE, CLIENT_DISCONNECT_REASON);
            }
            tracing::debug!(channel = %live.id, "detached channel");
        }
    }

    fn handle_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            tracing::debug!(state = ?self.state, "ignoring duplicate open");
            return;
        }

        self.transition(ConnectionState::Open);
        let resumed = self.resumed_after.take();
        self.reconnect_attempts = 0;
        self.heartbeat_due = Some(self.env.now() + self.config.heartbeat_interval);

        tracing::info!("connected");
        self.emit(EventKind::Connect, &Value::Null);

        if let Some(attempts) = resumed {
            tracing::info!(attempts, "reconnected");
            self.emit(EventKind::ReconnectSuccess, &json!({ "attempts": attempts }));
        }
    }

    fn handle_message(&mut self, text: &str) {
        match InboundMessage::decode(text) {
            Ok(message) => {
                let delivered = self.registry.emit(&message.kind, &message.payload);
                tracing::trace!(event = %message.kind, delivered, "dispatched frame");
            },
            Err(err) if err.is_malformed() => {
                tracing::warn!(error = %err, "dropping malformed frame");
            },
            Err(err) => {
                tracing::debug!(error = %err, "dropping frame");
            },
        }
    }

    fn handle_error(&mut self, reason: &str) {
        tracing::warn!(reason, "channel error");
        self.emit(EventKind::Disconnect, &json!({ "error": true }));
    }

    fn handle_close(&mut self, code: u16, reason: &str) {
        self.heartbeat_due = None;
        self.live = None;

        if close::is_normal(code) {
            tracing::info!(code, reason, "channel closed by peer");
        } else {
            tracing::warn!(code, reason, "channel closed");
        }
        self.emit(EventKind::Disconnect, &json!({ "code": code, "reason": reason }));

        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        self.reconnect_due = None;

        let attempt = self.reconnect_attempts;
        if attempt >= self.config.max_reconnect_attempts {
            tracing::error!(attempts = attempt, "maximum reconnect attempts reached");
            self.transition(ConnectionState::Failed);
            self.emit(EventKind::ReconnectFailed, &Value::Null);
            return;
        }

        let delay = self.backoff.delay(attempt, self.env.random_u64());
        self.reconnect_attempts += 1;
        self.reconnect_due = Some(self.env.now() + delay);
        self.transition(ConnectionState::Reconnecting);

        let delay_ms = delay.as_millis() as u64;
        tracing::info!(attempt = self.reconnect_attempts, delay_ms, "reconnect scheduled");
        self.emit(
            EventKind::ReconnectAttempt,
            &json!({ "attempt": self.reconnect_attempts, "delay": delay_ms }),
        );
    }

    fn send_heartbeat(&mut self, now: E::Instant, due: E::Instant) {
        let interval = self.config.heartbeat_interval;
        let mut next = due + interval;
        if next <= now {
            next = now + interval;
        }
        self.heartbeat_due = Some(next);

        let ping = Ping { timestamp: self.env.wall_clock_millis() };
        match self.send_payload(MessageType::Ping, &ping) {
            Ok(()) => tracing::debug!(timestamp = ping.timestamp, "heartbeat sent"),
            Err(err) => tracing::warn!(error = %err, "heartbeat failed"),
        }
    }

    fn send_payload<P: Serialize>(
        &mut self,
        kind: MessageType,
        payload: &P,
    ) -> Result<(), SendError> {
        let message = OutboundMessage::with_payload(kind, payload)?;
        self.try_send(&message)
    }

    fn require_driver(&self, kind: MessageType) -> Result<(), SendError> {
        match &self.identity {
            Some(identity) if identity.is_driver() => Ok(()),
            _ => Err(SendError::RoleNotPermitted { kind }),
        }
    }

    fn emit(&self, kind: EventKind, payload: &Value) {
        self.registry.emit(kind.as_str(), payload);
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {next:?}",
            self.state
        );
        tracing::debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}

fn report(kind: MessageType, result: Result<(), SendError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%kind, error = %err, "message not sent");
            false
        },
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
        sync::{Arc, Mutex},
        time::{Duration, Instant},
    };

    use ridelink_proto::Url;

    use super::*;
    use crate::{error::TransportError, token::SharedToken};

    #[derive(Clone)]
    struct TestEnv {
        origin: Instant,
    }

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            self.origin
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0);
        }

        fn wall_clock_millis(&self) -> u64 {
            1_700_000_000_000
        }
    }

    #[derive(Default)]
    struct Wire {
        sent: Vec<String>,
        closed: Vec<(u16, String)>,
    }

    struct TestChannel(Rc<RefCell<Wire>>);

    impl Channel for TestChannel {
        fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            self.0.borrow_mut().sent.push(text);
            Ok(())
        }

        fn close(&mut self, code: u16, reason: &str) {
            self.0.borrow_mut().closed.push((code, reason.to_string()));
        }
    }

    #[derive(Default)]
    struct TestConnector {
        wire: Rc<RefCell<Wire>>,
        opened: Rc<Cell<usize>>,
        refuse: bool,
    }

    impl Connector for TestConnector {
        type Channel = TestChannel;

        fn open(&mut self, _id: ChannelId, _url: &Url) -> Result<TestChannel, TransportError> {
            if self.refuse {
                return Err(TransportError::Open("refused".into()));
            }
            self.opened.set(self.opened.get() + 1);
            Ok(TestChannel(Rc::clone(&self.wire)))
        }
    }

    #[allow(clippy::disallowed_methods)]
    fn manager(token: SharedToken) -> TestManager {
        let env = TestEnv { origin: Instant::now() };
        ConnectionManager::new(env, ManagerConfig::default(), TestConnector::default(), token)
    }

    type TestManager = ConnectionManager<TestEnv, TestConnector, SharedToken>;

    fn record(manager: &mut TestManager, event: EventKind) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = Listener::new(move |payload| sink.lock().unwrap().push(payload.clone()));
        manager.add_event_listener(event, listener);
        seen
    }

    #[test]
    fn missing_token_fails_without_opening() {
        let mut manager = manager(SharedToken::empty());

        assert!(!manager.initialize("u1", Role::Rider));
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert_eq!(manager.connector().opened.get(), 0);
        assert_eq!(manager.next_deadline(), None);
    }

    #[test]
    fn empty_token_counts_as_missing() {
        let mut manager = manager(SharedToken::new(""));
        assert!(!manager.connect());
        assert_eq!(manager.state(), ConnectionState::Failed);
    }

    #[test]
    fn open_starts_heartbeat_and_emits_connect() {
        let mut manager = manager(SharedToken::new("t"));
        let connects = record(&mut manager, EventKind::Connect);

        assert!(manager.initialize("u1", Role::Rider));
        assert_eq!(manager.state(), ConnectionState::Connecting);

        let channel = manager.current_channel().unwrap();
        manager.handle_channel_event(ChannelEvent::Opened { channel });

        assert!(manager.is_connected());
        assert_eq!(connects.lock().unwrap().len(), 1);
        assert!(manager.next_deadline().is_some());
    }

    #[test]
    fn stale_channel_events_are_ignored() {
        let mut manager = manager(SharedToken::new("t"));
        let disconnects = record(&mut manager, EventKind::Disconnect);

        manager.connect();
        let first = manager.current_channel().unwrap();
        manager.connect();

        manager.handle_channel_event(ChannelEvent::Closed {
            channel: first,
            code: 1006,
            reason: String::new(),
        });

        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert!(disconnects.lock().unwrap().is_empty());
    }

    #[test]
    fn refused_open_schedules_reconnect() {
        let mut manager = manager(SharedToken::new("t"));
        manager.connector_mut().refuse = true;

        assert!(!manager.connect());
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert_eq!(manager.reconnect_attempts(), 1);
        assert!(manager.next_deadline().is_some());
    }

    #[test]
    fn send_requires_open_channel() {
        let mut manager = manager(SharedToken::new("t"));
        manager.connect();

        assert!(!manager.send(MessageType::PaymentUpdate, json!({})));
        assert!(manager.connector().wire.borrow().sent.is_empty());

        let channel = manager.current_channel().unwrap();
        manager.handle_channel_event(ChannelEvent::Opened { channel });
        assert!(manager.send(MessageType::PaymentUpdate, json!({"amount": 12})));
        assert_eq!(manager.connector().wire.borrow().sent.len(), 1);
    }

    #[test]
    fn rider_cannot_use_driver_messages() {
        let mut manager = manager(SharedToken::new("t"));
        manager.initialize("u1", Role::Rider);
        let channel = manager.current_channel().unwrap();
        manager.handle_channel_event(ChannelEvent::Opened { channel });

        assert!(!manager.update_driver_status(DriverStatus::Online));
        assert!(!manager.respond_to_trip("trip-1", true));
        assert!(manager.connector().wire.borrow().sent.is_empty());
    }

    #[test]
    fn disconnect_closes_normally() {
        let mut manager = manager(SharedToken::new("t"));
        manager.connect();
        let channel = manager.current_channel().unwrap();
        manager.handle_channel_event(ChannelEvent::Opened { channel });

        manager.disconnect();

        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(
            manager.connector().wire.borrow().closed,
            vec![(1000, "Client disconnecting".to_string())]
        );
        assert_eq!(manager.next_deadline(), None);
    }
}
