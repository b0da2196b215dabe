//! Protocol error types.

use thiserror::Error;

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding, decoding, or addressing frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame text was not valid JSON, or a payload failed to serialize.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame decoded but carried no usable `type` field.
    #[error("frame has no type field")]
    MissingType,

    /// Endpoint string could not be parsed as a URL.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// The rejected endpoint
        endpoint: String,
        /// Parser message
        reason: String,
    },

    /// Endpoint parsed but does not use `ws` or `wss`.
    #[error("unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),
}

impl ProtocolError {
    /// Returns true if the frame was not parseable at all, as opposed to
    /// parseable but carrying no event name.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}
