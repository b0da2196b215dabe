//! Credential lookup.
//!
//! The manager reads the token at the start of every connection attempt, so a
//! refreshed token is picked up by the next reconnect without any call into
//! the manager.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

/// Source of the bearer token used to authenticate the channel.
pub trait TokenStore {
    /// Current token, or `None` when signed out.
    fn token(&self) -> Option<String>;
}

impl<F> TokenStore for F
where
    F: Fn() -> Option<String>,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Shared, mutable token slot.
///
/// Cloning yields another handle to the same slot, so the auth layer can
/// update the token the manager will read on its next attempt.
#[derive(Clone, Default)]
pub struct SharedToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedToken {
    /// Slot holding `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self { inner: Arc::new(RwLock::new(Some(token.into()))) }
    }

    /// Empty slot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the token.
    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Remove the token (sign out).
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl TokenStore for SharedToken {
    fn token(&self) -> Option<String> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl fmt::Debug for SharedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = self.inner.read().unwrap_or_else(PoisonError::into_inner).is_some();
        f.debug_struct("SharedToken").field("present", &present).finish()
    }
}
