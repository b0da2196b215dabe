//! Connection lifecycle states.
//!
//! ```text
//!            connect()
//!   Idle ──────────────► Connecting ──opened──► Open
//!                          │    ▲                 │
//!              open failed │    │ timer           │ closed
//!                          ▼    │                 ▼
//!                       Reconnecting ◄────────────┘
//!                          │
//!                          │ attempts exhausted
//!                          ▼
//!                        Failed
//!
//!   disconnect() from any state ──► Closed
//! ```

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Nothing attempted yet
    Idle,
    /// Channel opening
    Connecting,
    /// Channel open, heartbeats running
    Open,
    /// Closed on request; no reconnect pending
    Closed,
    /// Waiting for the reconnect timer
    Reconnecting,
    /// Gave up (attempts exhausted or no credential)
    Failed,
}

impl ConnectionState {
    /// Returns true if outbound messages can be written.
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    /// Whether the manager may move from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        match next {
            Self::Idle => false,
            Self::Connecting | Self::Closed | Self::Failed => true,
            Self::Open => self == Self::Connecting,
            Self::Reconnecting => matches!(self, Self::Connecting | Self::Open),
        }
    }
}
