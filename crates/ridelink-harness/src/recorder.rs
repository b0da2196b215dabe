//! Listener that records every event it sees.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ridelink_core::{ConnectionManager, Connector, Environment, Listener, TokenStore};
use ridelink_proto::EventKind;
use serde_json::Value;

/// One emitted event.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Event name
    pub name: String,
    /// Payload passed to listeners
    pub payload: Value,
}

/// Records events across every name it is attached to, in emission order.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl EventRecorder {
    /// Recorder listening to every lifecycle and domain event of `manager`.
    pub fn attach<E, C, T>(manager: &mut ConnectionManager<E, C, T>) -> Self
    where
        E: Environment,
        C: Connector,
        T: TokenStore,
    {
        let recorder = Self::default();
        for kind in EventKind::LIFECYCLE.into_iter().chain(EventKind::DOMAIN) {
            manager.add_event_listener(kind, recorder.listener_for(kind.as_str()));
        }
        recorder
    }

    /// Listener that records under `name`.
    pub fn listener_for(&self, name: &str) -> Listener {
        let events = Arc::clone(&self.events);
        let name = name.to_string();
        Listener::new(move |payload| {
            events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(RecordedEvent { name: name.clone(), payload: payload.clone() });
        })
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().clone()
    }

    /// Event names in emission order.
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|event| event.name.clone()).collect()
    }

    /// Payloads recorded under `name`.
    pub fn payloads(&self, name: impl AsRef<str>) -> Vec<Value> {
        let name = name.as_ref();
        self.lock().iter().filter(|e| e.name == name).map(|e| e.payload.clone()).collect()
    }

    /// Number of events recorded under `name`.
    pub fn count(&self, name: impl AsRef<str>) -> usize {
        let name = name.as_ref();
        self.lock().iter().filter(|e| e.name == name).count()
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
