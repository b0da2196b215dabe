//! Frame envelopes.
//!
//! Both directions share the envelope `{"type": ..., "payload": ...}`. The
//! outbound side is closed: the client only ever sends one of the
//! [`MessageType`] variants. The inbound side is open: any non-empty `type`
//! string becomes an event name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ProtocolError, Result};

/// Message types the client sends to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Current device location
    LocationUpdate,
    /// Driver availability (drivers only)
    StatusUpdate,
    /// Accept or decline a trip request (drivers only)
    TripResponse,
    /// Safety escalation
    EmergencyAlert,
    /// Payment progress
    PaymentUpdate,
    /// Heartbeat
    Ping,
}

impl MessageType {
    /// Every outbound message type.
    pub const ALL: [Self; 6] = [
        Self::LocationUpdate,
        Self::StatusUpdate,
        Self::TripResponse,
        Self::EmergencyAlert,
        Self::PaymentUpdate,
        Self::Ping,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocationUpdate => "location_update",
            Self::StatusUpdate => "status_update",
            Self::TripResponse => "trip_response",
            Self::EmergencyAlert => "emergency_alert",
            Self::PaymentUpdate => "payment_update",
            Self::Ping => "ping",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message on its way to the backend.
///
/// Ephemeral: built, encoded, handed to the channel, and dropped. Nothing is
/// queued for later delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message type
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Structured payload
    pub payload: Value,
}

impl OutboundMessage {
    /// Build a message from an already structured payload.
    pub fn new(kind: MessageType, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Build a message from any serializable payload struct.
    pub fn with_payload<T: Serialize>(kind: MessageType, payload: &T) -> Result<Self> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A decoded inbound frame, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Event name, taken verbatim from the frame's `type` field
    pub kind: String,
    /// Frame payload, `Value::Null` when absent
    pub payload: Value,
}

impl InboundMessage {
    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if the text is not JSON
    /// - `ProtocolError::MissingType` if the JSON has no non-empty string
    ///   `type` field (including non-object JSON values)
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty())
            .ok_or(ProtocolError::MissingType)?
            .to_string();

        let payload = value.get("payload").cloned().unwrap_or(Value::Null);

        Ok(Self { kind, payload })
    }
}
