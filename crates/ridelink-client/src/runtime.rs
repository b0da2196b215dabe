//! Single-task runtime for the connection manager.
//!
//! The manager is plain `&mut self` state. [`Runtime`] owns it on one tokio
//! task and serializes its three input sources:
//!
//! - commands from [`ManagerHandle`]s (host calls, with oneshot replies)
//! - [`ChannelEvent`]s from the connector's channel tasks
//! - the next timer deadline reported by the manager
//!
//! After every input the manager is ticked, so overdue timers fire before the
//! loop waits again.

use std::{future::Future, time::Duration};

use ridelink_core::{
    ChannelEvent, ConnectionManager, ConnectionState, Connector, Environment, Listener,
    ManagerConfig, Role, TokenStore,
};
use ridelink_proto::{DriverStatus, EmergencyAlert, Location, MessageType};
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{error::RuntimeError, system_env::SystemEnv, transport::WsConnector};

/// Queued host commands before callers wait for the runtime.
const COMMAND_BUFFER: usize = 64;

enum Command {
    Initialize { user_id: String, role: Role, reply: oneshot::Sender<bool> },
    Connect { reply: oneshot::Sender<bool> },
    Disconnect { reply: oneshot::Sender<()> },
    Send { kind: MessageType, payload: Value, reply: oneshot::Sender<bool> },
    UpdateLocation { location: Location, reply: oneshot::Sender<bool> },
    UpdateDriverStatus { status: DriverStatus, reply: oneshot::Sender<bool> },
    RespondToTrip { trip_id: String, accepted: bool, reply: oneshot::Sender<bool> },
    EmergencyAlert { alert: EmergencyAlert, reply: oneshot::Sender<bool> },
    AddListener { event: String, listener: Listener },
    RemoveListener { event: String, listener: Listener },
    State { reply: oneshot::Sender<ConnectionState> },
    Shutdown,
}

enum Input {
    Command(Option<Command>),
    Channel(ChannelEvent),
    Timer,
}

/// Owns a [`ConnectionManager`] and drives it from a tokio task.
pub struct Runtime<E, C, T>
where
    E: Environment,
    C: Connector,
    T: TokenStore,
{
    env: E,
    manager: ConnectionManager<E, C, T>,
    commands: mpsc::Receiver<Command>,
    channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl<T> Runtime<SystemEnv, WsConnector, T>
where
    T: TokenStore + Send + 'static,
{
    /// Websocket runtime on the system clock.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Config` if `config` does not validate.
    pub fn websocket(
        config: ManagerConfig,
        tokens: T,
    ) -> Result<(Self, ManagerHandle), RuntimeError> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connector = WsConnector::new(events_tx, config.connection_timeout);
        let env = SystemEnv::new();
        let manager = ConnectionManager::new(env, config, connector, tokens);

        Ok(Self::new(env, manager, events_rx))
    }
}

impl<E, C, T> Runtime<E, C, T>
where
    E: Environment,
    C: Connector,
    T: TokenStore,
{
    /// Wrap `manager`. `channel_events` must be the queue its connector
    /// reports to.
    pub fn new(
        env: E,
        manager: ConnectionManager<E, C, T>,
        channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> (Self, ManagerHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let runtime = Self { env, manager, commands, channel_events };
        (runtime, ManagerHandle { commands: commands_tx })
    }

    /// Run until shut down or every handle is dropped. The channel is
    /// disconnected on the way out.
    pub async fn run(mut self) {
        loop {
            match self.next_input().await {
                Input::Command(Some(Command::Shutdown) | None) => break,
                Input::Command(Some(command)) => self.execute(command),
                Input::Channel(event) => self.manager.handle_channel_event(event),
                Input::Timer => {},
            }
            self.manager.tick(self.env.now());
        }

        self.manager.disconnect();
        tracing::info!("connection runtime stopped");
    }

    async fn next_input(&mut self) -> Input {
        let now = self.env.now();
        let sleep = self.manager.next_deadline().map(|deadline| {
            let remaining = if deadline > now { deadline - now } else { Duration::ZERO };
            self.env.sleep(remaining)
        });

        tokio::select! {
            command = self.commands.recv() => Input::Command(command),
            Some(event) = self.channel_events.recv() => Input::Channel(event),
            () = wait_for(sleep) => Input::Timer,
        }
    }

    fn execute(&mut self, command: Command) {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            Command::Initialize { user_id, role, reply } => {
                let _ = reply.send(self.manager.initialize(user_id, role));
            },
            Command::Connect { reply } => {
                let _ = reply.send(self.manager.connect());
            },
            Command::Disconnect { reply } => {
                self.manager.disconnect();
                let _ = reply.send(());
            },
            Command::Send { kind, payload, reply } => {
                let _ = reply.send(self.manager.send(kind, payload));
            },
            Command::UpdateLocation { location, reply } => {
                let _ = reply.send(self.manager.update_location(&location));
            },
            Command::UpdateDriverStatus { status, reply } => {
                let _ = reply.send(self.manager.update_driver_status(status));
            },
            Command::RespondToTrip { trip_id, accepted, reply } => {
                let _ = reply.send(self.manager.respond_to_trip(trip_id, accepted));
            },
            Command::EmergencyAlert { alert, reply } => {
                let _ = reply.send(self.manager.send_emergency_alert(&alert));
            },
            Command::AddListener { event, listener } => {
                self.manager.add_event_listener(event, listener);
            },
            Command::RemoveListener { event, listener } => {
                self.manager.remove_event_listener(event, &listener);
            },
            Command::State { reply } => {
                let _ = reply.send(self.manager.state());
            },
            Command::Shutdown => {},
        }
    }
}

impl<E, C, T> Runtime<E, C, T>
where
    E: Environment,
    C: Connector + Send + 'static,
    C::Channel: Send,
    T: TokenStore + Send + 'static,
{
    /// Spawn [`run`](Self::run) on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

async fn wait_for<F: Future<Output = ()>>(sleep: Option<F>) {
    match sleep {
        Some(sleep) => sleep.await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle for host code.
///
/// Every call is forwarded to the runtime task and answered once the manager
/// has processed it. Calls fail with `RuntimeError::Stopped` after the
/// runtime exits.
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    commands: mpsc::Sender<Command>,
}

impl ManagerHandle {
    /// See `ConnectionManager::initialize`.
    pub async fn initialize(
        &self,
        user_id: impl Into<String>,
        role: Role,
    ) -> Result<bool, RuntimeError> {
        let user_id = user_id.into();
        self.request(|reply| Command::Initialize { user_id, role, reply }).await
    }

    /// See `ConnectionManager::connect`.
    pub async fn connect(&self) -> Result<bool, RuntimeError> {
        self.request(|reply| Command::Connect { reply }).await
    }

    /// See `ConnectionManager::disconnect`.
    pub async fn disconnect(&self) -> Result<(), RuntimeError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// See `ConnectionManager::send`.
    pub async fn send(&self, kind: MessageType, payload: Value) -> Result<bool, RuntimeError> {
        self.request(|reply| Command::Send { kind, payload, reply }).await
    }

    /// See `ConnectionManager::update_location`.
    pub async fn update_location(&self, location: Location) -> Result<bool, RuntimeError> {
        self.request(|reply| Command::UpdateLocation { location, reply }).await
    }

    /// See `ConnectionManager::update_driver_status`.
    pub async fn update_driver_status(&self, status: DriverStatus) -> Result<bool, RuntimeError> {
        self.request(|reply| Command::UpdateDriverStatus { status, reply }).await
    }

    /// See `ConnectionManager::respond_to_trip`.
    pub async fn respond_to_trip(
        &self,
        trip_id: impl Into<String>,
        accepted: bool,
    ) -> Result<bool, RuntimeError> {
        let trip_id = trip_id.into();
        self.request(|reply| Command::RespondToTrip { trip_id, accepted, reply }).await
    }

    /// See `ConnectionManager::send_emergency_alert`.
    pub async fn send_emergency_alert(&self, alert: EmergencyAlert) -> Result<bool, RuntimeError> {
        self.request(|reply| Command::EmergencyAlert { alert, reply }).await
    }

    /// Subscribe `listener` to `event`. Listeners run on the runtime task.
    pub async fn add_event_listener(
        &self,
        event: impl AsRef<str>,
        listener: Listener,
    ) -> Result<(), RuntimeError> {
        let event = event.as_ref().to_string();
        self.submit(Command::AddListener { event, listener }).await
    }

    /// Unsubscribe `listener` from `event`.
    pub async fn remove_event_listener(
        &self,
        event: impl AsRef<str>,
        listener: Listener,
    ) -> Result<(), RuntimeError> {
        let event = event.as_ref().to_string();
        self.submit(Command::RemoveListener { event, listener }).await
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> Result<ConnectionState, RuntimeError> {
        self.request(|reply| Command::State { reply }).await
    }

    /// True while the channel is open.
    pub async fn is_connected(&self) -> Result<bool, RuntimeError> {
        Ok(self.state().await?.is_open())
    }

    /// Stop the runtime. The channel is disconnected first.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.submit(Command::Shutdown).await
    }

    async fn submit(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands.send(command).await.map_err(|_| RuntimeError::Stopped)
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.submit(build(reply)).await?;
        response.await.map_err(|_| RuntimeError::Stopped)
    }
}
