//! Production Environment implementation using system time and RNG.
//!
//! - Real monotonic time (`std::time::Instant`) for timers
//! - OS randomness (getrandom) for reconnect jitter
//! - Tokio sleep for actual delays
//! - System wall clock for heartbeat timestamps

use std::time::{Duration, UNIX_EPOCH};

use ridelink_core::Environment;

/// Production environment backed by the operating system.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. That only happens when the
/// platform itself is broken.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG is available");
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}
