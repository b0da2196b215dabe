//! Production glue for the ridelink connection manager.
//!
//! - [`SystemEnv`]: system clock, OS randomness, tokio sleep
//! - [`WsConnector`]: websocket channels via tokio-tungstenite
//! - [`Runtime`] / [`ManagerHandle`]: one task owning the manager, and the
//!   cloneable handle host code uses to talk to it
//!
//! ```no_run
//! use ridelink_client::Runtime;
//! use ridelink_core::{ManagerConfig, Role, SharedToken};
//!
//! # async fn demo() -> Result<(), ridelink_client::RuntimeError> {
//! let token = SharedToken::new("bearer-token");
//! let (runtime, handle) = Runtime::websocket(ManagerConfig::default(), token)?;
//! let task = runtime.spawn();
//!
//! handle.initialize("user-1", Role::Rider).await?;
//! // ...
//! handle.shutdown().await?;
//! let _ = task.await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod runtime;
pub mod system_env;
pub mod transport;

pub use error::RuntimeError;
pub use runtime::{ManagerHandle, Runtime};
pub use system_env::SystemEnv;
pub use transport::{WsChannel, WsConnector};
