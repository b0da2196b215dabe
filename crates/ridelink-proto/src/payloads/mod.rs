//! Typed payloads for outbound messages.
//!
//! Each struct serializes to the JSON object the backend consumer expects for
//! the corresponding [`crate::MessageType`]. Optional fields are omitted from
//! the wire rather than sent as `null`.

pub mod driver;
pub mod location;

pub use driver::{DriverStatus, StatusUpdate, TripResponse};
pub use location::{Coordinates, EmergencyAlert, Location};
use serde::{Deserialize, Serialize};

/// Heartbeat payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Wall clock at send time, milliseconds since the Unix epoch
    pub timestamp: u64,
}
