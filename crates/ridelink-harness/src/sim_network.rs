//! Recording in-memory connector.
//!
//! Nothing is delivered anywhere. The network remembers what the manager
//! asked of it so tests can assert on it, and it can be told to refuse
//! opens or writes to exercise failure paths. Channel lifecycle (open,
//! message, close) is injected by the test through
//! `ConnectionManager::handle_channel_event`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ridelink_core::{Channel, ChannelId, Connector, TransportError};
use ridelink_proto::Url;
use serde_json::Value;

#[derive(Default)]
struct NetState {
    opened: Vec<(ChannelId, Url)>,
    sent: Vec<(ChannelId, String)>,
    closes: Vec<(ChannelId, u16, String)>,
    dropped: Vec<ChannelId>,
    refuse_opens: usize,
    refuse_sends: bool,
}

fn lock(state: &Mutex<NetState>) -> MutexGuard<'_, NetState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory connector. Clones observe the same network.
#[derive(Clone, Default)]
pub struct SimNetwork {
    state: Arc<Mutex<NetState>>,
}

impl SimNetwork {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `count` open attempts.
    pub fn fail_next_opens(&self, count: usize) {
        lock(&self.state).refuse_opens = count;
    }

    /// Make every channel reject writes (or accept them again).
    pub fn set_refuse_sends(&self, refuse: bool) {
        lock(&self.state).refuse_sends = refuse;
    }

    /// Every channel opened, with the URL it was opened against.
    pub fn opened(&self) -> Vec<(ChannelId, Url)> {
        lock(&self.state).opened.clone()
    }

    /// Number of successful open calls.
    pub fn open_count(&self) -> usize {
        lock(&self.state).opened.len()
    }

    /// Most recently opened channel.
    pub fn last_channel(&self) -> Option<ChannelId> {
        lock(&self.state).opened.last().map(|(id, _)| *id)
    }

    /// Channels opened and not yet released by the manager.
    pub fn live_channels(&self) -> Vec<ChannelId> {
        let state = lock(&self.state);
        state
            .opened
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !state.dropped.contains(id))
            .collect()
    }

    /// Raw frames written, in order.
    pub fn sent_frames(&self) -> Vec<(ChannelId, String)> {
        lock(&self.state).sent.clone()
    }

    /// Written frames parsed as JSON. Unparseable frames are skipped.
    pub fn sent_messages(&self) -> Vec<Value> {
        lock(&self.state)
            .sent
            .iter()
            .filter_map(|(_, text)| serde_json::from_str(text).ok())
            .collect()
    }

    /// Written frames whose `type` is `kind`.
    pub fn sent_of_type(&self, kind: &str) -> Vec<Value> {
        self.sent_messages()
            .into_iter()
            .filter(|message| message.get("type").and_then(Value::as_str) == Some(kind))
            .collect()
    }

    /// Close handshakes the manager started.
    pub fn closes(&self) -> Vec<(ChannelId, u16, String)> {
        lock(&self.state).closes.clone()
    }
}

impl Connector for SimNetwork {
    type Channel = SimChannel;

    fn open(&mut self, id: ChannelId, url: &Url) -> Result<SimChannel, TransportError> {
        let mut state = lock(&self.state);
        if state.refuse_opens > 0 {
            state.refuse_opens -= 1;
            tracing::debug!(%id, "refusing open");
            return Err(TransportError::Open("simulated refusal".into()));
        }

        state.opened.push((id, url.clone()));
        Ok(SimChannel { id, state: Arc::clone(&self.state) })
    }
}

/// Channel handed to the manager by [`SimNetwork`].
pub struct SimChannel {
    id: ChannelId,
    state: Arc<Mutex<NetState>>,
}

impl Channel for SimChannel {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.refuse_sends {
            return Err(TransportError::Send("simulated write failure".into()));
        }
        state.sent.push((self.id, text));
        Ok(())
    }

    fn close(&mut self, code: u16, reason: &str) {
        lock(&self.state).closes.push((self.id, code, reason.to_string()));
    }
}

impl Drop for SimChannel {
    fn drop(&mut self) {
        lock(&self.state).dropped.push(self.id);
    }
}
