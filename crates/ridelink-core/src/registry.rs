//! Subscription registry.
//!
//! Maps event names to ordered listener lists. Listeners are compared by
//! identity (the same `Arc`), never by behaviour, so registering one listener
//! twice yields two entries and removing it removes both.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use serde_json::Value;

/// Callback invoked with an event payload.
///
/// Cheap to clone; clones are the same listener for removal purposes.
#[derive(Clone)]
pub struct Listener(Arc<dyn Fn(&Value) + Send + Sync>);

impl Listener {
    /// Wrap a callback.
    pub fn new(callback: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    fn call(&self, payload: &Value) {
        (self.0)(payload);
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&Arc::as_ptr(&self.0).cast::<()>()).finish()
    }
}

/// Event name to listeners.
#[derive(Debug, Default)]
pub struct Registry {
    listeners: HashMap<String, Vec<Listener>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` to the list for `event`.
    pub fn add(&mut self, event: impl Into<String>, listener: Listener) {
        self.listeners.entry(event.into()).or_default().push(listener);
    }

    /// Remove every registration of `listener` for `event`. Unknown pairs are
    /// ignored.
    pub fn remove(&mut self, event: &str, listener: &Listener) {
        if let Some(list) = self.listeners.get_mut(event) {
            list.retain(|registered| registered != listener);
            if list.is_empty() {
                self.listeners.remove(event);
            }
        }
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    /// Invoke each listener for `event` in registration order.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    /// Returns the number of listeners that completed.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let Some(list) = self.listeners.get(event) else {
            return 0;
        };

        let mut completed = 0;
        for listener in list {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.call(payload))) {
                Ok(()) => completed += 1,
                Err(cause) => {
                    tracing::warn!(event, panic = %panic_message(&*cause), "listener panicked");
                },
            }
        }

        completed
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(message) = cause.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
