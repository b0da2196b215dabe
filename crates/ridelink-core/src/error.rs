//! Error types for the connection manager.
//!
//! Host-facing operations report success as a `bool` and log failures. The
//! typed errors below are what those booleans summarize, and are returned
//! directly by the `try_*` variants for callers that want the reason.

use std::time::Duration;

use ridelink_proto::{MessageType, ProtocolError};
use thiserror::Error;

use crate::state::ConnectionState;

/// Failures reported by a transport channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Channel could not be opened
    #[error("failed to open channel: {0}")]
    Open(String),

    /// Channel is already closed
    #[error("channel closed")]
    Closed,

    /// Frame could not be written
    #[error("send failed: {0}")]
    Send(String),
}

/// Why a connection attempt did not start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// No token available from the credential store
    #[error("no authentication token available")]
    MissingCredential,

    /// Transport refused to start the channel
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ConnectError {
    /// Returns true if the failure should feed the reconnect policy.
    ///
    /// A missing credential will not fix itself on a timer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Why an outbound message was not written.
#[derive(Error, Debug)]
pub enum SendError {
    /// Channel is not open
    #[error("cannot send {kind}: connection is {state:?}")]
    NotOpen {
        /// Message that was dropped
        kind: MessageType,
        /// State at the time of the call
        state: ConnectionState,
    },

    /// Message is reserved for drivers
    #[error("{kind} is only available to drivers")]
    RoleNotPermitted {
        /// Message that was dropped
        kind: MessageType,
    },

    /// Payload failed to serialize
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),

    /// Transport rejected the frame
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Invalid [`crate::ManagerConfig`] values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Heartbeat interval of zero would spin
    #[error("heartbeat interval must be non-zero")]
    ZeroHeartbeat,

    /// Factor must be finite and at least 1
    #[error("invalid backoff factor: {0}")]
    InvalidBackoffFactor(f64),

    /// Ceiling below the first delay
    #[error("reconnect max delay {max:?} is below base delay {base:?}")]
    MaxDelayBelowBase {
        /// Configured base delay
        base: Duration,
        /// Configured ceiling
        max: Duration,
    },
}
