//! Driver-only payloads.
//!
//! The backend rejects these from rider sessions, and the connection manager
//! refuses to send them unless the local identity is a driver.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Driver availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    /// Accepting trip requests
    Online,
    /// Not accepting trip requests
    Offline,
    /// On a trip
    Busy,
}

impl DriverStatus {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Busy => "busy",
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "busy" => Ok(Self::Busy),
            other => Err(format!("unknown driver status: {other}")),
        }
    }
}

/// `status_update` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// New availability
    pub status: DriverStatus,
}

/// `trip_response` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripResponse {
    /// Trip being answered
    pub trip_id: String,
    /// Whether the driver takes the trip
    pub accepted: bool,
}
