//! Runtime error types.

use ridelink_core::ConfigError;
use thiserror::Error;

/// Errors surfaced to host code talking to a [`crate::Runtime`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration rejected before starting
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The runtime task has exited; the handle is dead
    #[error("connection runtime has stopped")]
    Stopped,
}
