//! Transport seam.
//!
//! A [`Connector`] starts channels. Each channel reports what happens to it
//! asynchronously as [`ChannelEvent`]s tagged with the [`ChannelId`] the
//! manager assigned when opening it. The manager ignores events from any
//! channel other than the current one, which is how handlers of a replaced
//! channel are detached.

use std::fmt;

use ridelink_proto::Url;

use crate::error::TransportError;

/// Identifies one channel instance for the lifetime of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Something that happened on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Opening handshake completed
    Opened {
        /// Source channel
        channel: ChannelId,
    },
    /// Text frame received
    Message {
        /// Source channel
        channel: ChannelId,
        /// Frame body
        text: String,
    },
    /// Transport-level error
    Error {
        /// Source channel
        channel: ChannelId,
        /// Transport description
        reason: String,
    },
    /// Channel closed (by either side, or because opening failed)
    Closed {
        /// Source channel
        channel: ChannelId,
        /// Close code
        code: u16,
        /// Close reason
        reason: String,
    },
}

impl ChannelEvent {
    /// Channel the event came from.
    pub fn channel(&self) -> ChannelId {
        match self {
            Self::Opened { channel }
            | Self::Message { channel, .. }
            | Self::Error { channel, .. }
            | Self::Closed { channel, .. } => *channel,
        }
    }
}

/// Write half of an open (or opening) channel.
///
/// Dropping the channel releases the underlying connection.
pub trait Channel {
    /// Write one text frame.
    ///
    /// # Errors
    ///
    /// `TransportError` if the channel can no longer accept frames.
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Start a close handshake. Best effort.
    fn close(&mut self, code: u16, reason: &str);
}

/// Starts channels.
pub trait Connector {
    /// Channel type produced.
    type Channel: Channel;

    /// Begin opening a channel to `url`.
    ///
    /// Returning `Ok` means the attempt started; the outcome arrives later as
    /// `Opened` or `Closed` for `id`.
    ///
    /// # Errors
    ///
    /// `TransportError::Open` if the attempt cannot even be started.
    fn open(&mut self, id: ChannelId, url: &Url) -> Result<Self::Channel, TransportError>;
}
