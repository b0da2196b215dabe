//! A manager wired to the simulated environment and network.

use std::time::Duration;

use ridelink_core::{
    ChannelEvent, ChannelId, ConnectionManager, Environment, ManagerConfig, SharedToken,
};

use crate::{EventRecorder, SimEnv, SimNetwork};

/// Token the simulated client starts with.
pub const SIM_TOKEN: &str = "sim-token";

/// Manager type used throughout the simulation tests.
pub type SimManager = ConnectionManager<SimEnv, SimNetwork, SharedToken>;

/// Manager plus handles on everything around it.
///
/// `network` and `token` share state with the copies the manager owns, so
/// tests can inspect writes and rotate or clear the token at any point.
pub struct SimClient {
    /// Virtual clock and RNG
    pub env: SimEnv,
    /// Recording connector
    pub network: SimNetwork,
    /// Token slot read on every attempt
    pub token: SharedToken,
    /// Manager under test
    pub manager: SimManager,
    /// Every lifecycle and domain event emitted
    pub recorder: EventRecorder,
}

impl SimClient {
    /// Client with default configuration and a token present.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, ManagerConfig::default())
    }

    /// Client with `config` and a token present.
    pub fn with_config(seed: u64, config: ManagerConfig) -> Self {
        let env = SimEnv::with_seed(seed);
        let network = SimNetwork::new();
        let token = SharedToken::new(SIM_TOKEN);
        let mut manager =
            ConnectionManager::new(env.clone(), config, network.clone(), token.clone());
        let recorder = EventRecorder::attach(&mut manager);

        Self { env, network, token, manager, recorder }
    }

    /// Report the current channel as open.
    pub fn open(&mut self) -> Option<ChannelId> {
        let channel = self.manager.current_channel()?;
        self.manager.handle_channel_event(ChannelEvent::Opened { channel });
        Some(channel)
    }

    /// Report the current channel as closed by the peer.
    pub fn close(&mut self, code: u16, reason: &str) -> Option<ChannelId> {
        let channel = self.manager.current_channel()?;
        self.manager.handle_channel_event(ChannelEvent::Closed {
            channel,
            code,
            reason: reason.to_string(),
        });
        Some(channel)
    }

    /// Report a transport error on the current channel.
    pub fn error(&mut self, reason: &str) -> Option<ChannelId> {
        let channel = self.manager.current_channel()?;
        self.manager
            .handle_channel_event(ChannelEvent::Error { channel, reason: reason.to_string() });
        Some(channel)
    }

    /// Deliver a text frame on the current channel.
    pub fn deliver(&mut self, text: &str) -> Option<ChannelId> {
        let channel = self.manager.current_channel()?;
        self.manager
            .handle_channel_event(ChannelEvent::Message { channel, text: text.to_string() });
        Some(channel)
    }

    /// Advance the clock and fire whatever became due.
    pub fn advance(&mut self, duration: Duration) {
        self.env.advance(duration);
        self.manager.tick(self.env.now());
    }

    /// Jump to the next deadline and fire it. False if nothing is pending.
    pub fn advance_to_deadline(&mut self) -> bool {
        let Some(deadline) = self.manager.next_deadline() else {
            return false;
        };
        self.env.advance_to(deadline);
        self.manager.tick(self.env.now());
        true
    }
}
