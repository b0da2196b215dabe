//! Local event vocabulary.
//!
//! Lifecycle events are produced by the connection manager itself. Domain
//! events arrive from the backend: an inbound frame's `type` string is used
//! verbatim as the event name, so servers may send names not listed here and
//! subscribers can still register for them by string.

use std::{fmt, str::FromStr};

/// Well-known event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // Lifecycle
    /// Channel opened and authenticated.
    Connect,
    /// Channel closed or reported a transport error.
    Disconnect,
    /// A reconnect has been scheduled. Payload `{attempt, delay}`.
    ReconnectAttempt,
    /// Reconnect budget exhausted; no further automatic attempts.
    ReconnectFailed,
    /// A scheduled reconnect produced an open channel. Payload `{attempts}`.
    ReconnectSuccess,

    // Domain (server pushed)
    /// Peer location changed.
    LocationUpdate,
    /// Driver availability changed.
    DriverStatus,
    /// A rider requested a trip.
    TripRequest,
    /// A trip was cancelled.
    TripCancelled,
    /// A driver accepted a trip.
    TripAccepted,
    /// A trip started.
    TripStarted,
    /// A trip completed.
    TripCompleted,
    /// A payment settled.
    PaymentCompleted,
    /// A safety alert was raised.
    SafetyAlert,
}

impl EventKind {
    /// Lifecycle events emitted by the manager.
    pub const LIFECYCLE: [Self; 5] = [
        Self::Connect,
        Self::Disconnect,
        Self::ReconnectAttempt,
        Self::ReconnectFailed,
        Self::ReconnectSuccess,
    ];

    /// Domain events known to be pushed by the backend.
    pub const DOMAIN: [Self; 9] = [
        Self::LocationUpdate,
        Self::DriverStatus,
        Self::TripRequest,
        Self::TripCancelled,
        Self::TripAccepted,
        Self::TripStarted,
        Self::TripCompleted,
        Self::PaymentCompleted,
        Self::SafetyAlert,
    ];

    /// Event name as used for subscription.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::ReconnectAttempt => "reconnect_attempt",
            Self::ReconnectFailed => "reconnect_failed",
            Self::ReconnectSuccess => "reconnect_success",
            Self::LocationUpdate => "location_update",
            Self::DriverStatus => "driver_status",
            Self::TripRequest => "trip_request",
            Self::TripCancelled => "trip_cancelled",
            Self::TripAccepted => "trip_accepted",
            Self::TripStarted => "trip_started",
            Self::TripCompleted => "trip_completed",
            Self::PaymentCompleted => "payment_completed",
            Self::SafetyAlert => "safety_alert",
        }
    }

    /// Returns true for events produced by the manager rather than the
    /// backend.
    pub fn is_lifecycle(self) -> bool {
        Self::LIFECYCLE.contains(&self)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for EventKind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::LIFECYCLE
            .into_iter()
            .chain(Self::DOMAIN)
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event: {s}"))
    }
}
