//! Realtime connection manager.
//!
//! Owns one authenticated, bidirectional channel to the backend: connects,
//! keeps it alive with heartbeats, recovers from drops with bounded
//! exponential backoff, and fans inbound frames out to subscribers as named
//! events.
//!
//! # Sans-IO
//!
//! The [`ConnectionManager`] performs no I/O and reads no clock on its own
//! schedule. Drivers feed it three kinds of input, always from a single
//! thread of control:
//!
//! - host calls (`initialize`, `connect`, `send`, `disconnect`, ...)
//! - [`ChannelEvent`]s reported by the [`Connector`]'s channels
//! - `tick(now)` when the deadline from `next_deadline()` passes
//!
//! Time and randomness come from an [`Environment`], so the same state
//! machine runs against the system clock in production and a virtual clock
//! in simulation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backoff;
pub mod config;
pub mod env;
pub mod error;
pub mod identity;
pub mod manager;
pub mod registry;
pub mod state;
pub mod token;
pub mod transport;

pub use backoff::Backoff;
pub use config::ManagerConfig;
pub use env::Environment;
pub use error::{ConfigError, ConnectError, SendError, TransportError};
pub use identity::{Identity, Role};
pub use manager::ConnectionManager;
pub use registry::{Listener, Registry};
pub use state::ConnectionState;
pub use token::{SharedToken, TokenStore};
pub use transport::{Channel, ChannelEvent, ChannelId, Connector};
