//! Realtime endpoint addressing.
//!
//! The backend authenticates the socket through a `token` query parameter on
//! the upgrade URL. Because that URL carries a live credential, anything that
//! ends up in logs must go through [`redact`] first.

use std::{fmt, str::FromStr};

use url::Url;

use crate::errors::{ProtocolError, Result};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8081/ws/rides/";

/// Placeholder that replaces the token value in diagnostic output.
pub const REDACTED_TOKEN: &str = "TOKEN_HIDDEN";

/// Query parameter carrying the bearer token.
pub const TOKEN_PARAM: &str = "token";

/// Base WebSocket endpoint (scheme, host, path) without credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Parse and validate a `ws://` or `wss://` endpoint.
    pub fn parse(endpoint: &str) -> Result<Self> {
        let base = Url::parse(endpoint).map_err(|e| ProtocolError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        match base.scheme() {
            "ws" | "wss" => Ok(Self { base }),
            other => Err(ProtocolError::UnsupportedScheme(other.to_string())),
        }
    }

    /// The endpoint without credentials.
    pub fn as_url(&self) -> &Url {
        &self.base
    }

    /// Upgrade URL for a connection attempt authenticated with `token`.
    ///
    /// Existing query pairs on the base endpoint are preserved; the token is
    /// appended and percent-encoded.
    pub fn authenticated(&self, token: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair(TOKEN_PARAM, token);
        url
    }
}

impl Default for Endpoint {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::parse(DEFAULT_ENDPOINT).expect("invariant: default endpoint is a valid ws URL")
    }
}

impl FromStr for Endpoint {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)
    }
}

/// Render `url` for logs with any token value replaced by [`REDACTED_TOKEN`].
pub fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(key, _)| key == TOKEN_PARAM) {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value =
                if key == TOKEN_PARAM { REDACTED_TOKEN.to_string() } else { value.into_owned() };
            (key.into_owned(), value)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
