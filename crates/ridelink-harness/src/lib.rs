//! Deterministic simulation harness for the ridelink connection manager.
//!
//! In-memory implementations of the [`Environment`] and [`Connector`] seams:
//! a virtual clock with a seeded RNG, and a network that records every
//! channel opened, frame written, and close requested. Tests drive channel
//! lifecycle by hand and advance time explicitly, so every run with the same
//! seed makes the same decisions.
//!
//! [`Environment`]: ridelink_core::Environment
//! [`Connector`]: ridelink_core::Connector

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod recorder;
pub mod sim_client;
pub mod sim_env;
pub mod sim_network;

pub use recorder::{EventRecorder, RecordedEvent};
pub use sim_client::{SimClient, SimManager};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_network::{SimChannel, SimNetwork};
