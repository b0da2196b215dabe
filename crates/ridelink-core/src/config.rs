//! Connection manager configuration.

use std::time::Duration;

use ridelink_proto::Endpoint;

use crate::{backoff::Backoff, error::ConfigError};

/// Interval between heartbeat pings while the channel is open.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Delay before the first reconnect attempt, before jitter.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Growth factor applied per failed attempt.
pub const DEFAULT_RECONNECT_BACKOFF_FACTOR: f64 = 1.5;

/// Upper bound (exclusive) of the random jitter added to each delay.
pub const DEFAULT_RECONNECT_JITTER: Duration = Duration::from_millis(1000);

/// Ceiling for any single reconnect delay.
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Reconnect attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Time allowed for the opening handshake. Enforced by the transport.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection manager configuration
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Realtime endpoint; the token is appended per attempt
    pub endpoint: Endpoint,
    /// Heartbeat interval while open
    pub heartbeat_interval: Duration,
    /// Base reconnect delay
    pub reconnect_base_delay: Duration,
    /// Exponential growth factor
    pub reconnect_backoff_factor: f64,
    /// Maximum random jitter (exclusive)
    pub reconnect_jitter: Duration,
    /// Delay ceiling
    pub reconnect_max_delay: Duration,
    /// Attempts before the manager gives up
    pub max_reconnect_attempts: u32,
    /// Opening handshake timeout (transport-enforced)
    pub connection_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            reconnect_backoff_factor: DEFAULT_RECONNECT_BACKOFF_FACTOR,
            reconnect_jitter: DEFAULT_RECONNECT_JITTER,
            reconnect_max_delay: DEFAULT_RECONNECT_MAX_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl ManagerConfig {
    /// Default configuration pointed at `endpoint`.
    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        Self { endpoint, ..Self::default() }
    }

    /// Backoff policy derived from the reconnect settings.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.reconnect_base_delay,
            self.reconnect_backoff_factor,
            self.reconnect_jitter,
            self.reconnect_max_delay,
        )
    }

    /// Reject settings the manager cannot run with.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ZeroHeartbeat` if the heartbeat interval is zero
    /// - `ConfigError::InvalidBackoffFactor` if the factor is below 1 or not
    ///   finite
    /// - `ConfigError::MaxDelayBelowBase` if the ceiling is below the base
    ///   delay
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroHeartbeat);
        }

        if !self.reconnect_backoff_factor.is_finite() || self.reconnect_backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoffFactor(self.reconnect_backoff_factor));
        }

        if self.reconnect_max_delay < self.reconnect_base_delay {
            return Err(ConfigError::MaxDelayBelowBase {
                base: self.reconnect_base_delay,
                max: self.reconnect_max_delay,
            });
        }

        Ok(())
    }
}
