//! Ridelink wire protocol.
//!
//! Frames on the realtime channel are JSON text messages of the form
//! `{"type": <string>, "payload": <object>}`. This crate defines the typed
//! outbound messages the client may send, the decoding of inbound frames into
//! named events, the local event vocabulary, and the endpoint URL (including
//! bearer token placement and redaction).
//!
//! No I/O happens here. The connection manager in `ridelink-core` consumes
//! these types, and the transport in `ridelink-client` only moves strings.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod close;
pub mod endpoint;
pub mod errors;
pub mod event;
pub mod message;
pub mod payloads;

pub use endpoint::{Endpoint, REDACTED_TOKEN};
pub use errors::{ProtocolError, Result};
pub use event::EventKind;
pub use message::{InboundMessage, MessageType, OutboundMessage};
pub use payloads::{
    Coordinates, DriverStatus, EmergencyAlert, Location, Ping, StatusUpdate, TripResponse,
};
pub use url::Url;
