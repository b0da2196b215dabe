//! WebSocket close codes used by the client.
//!
//! Only the codes the client itself produces or reasons about are named here.
//! A close initiated by the peer triggers the reconnect path whatever its code;
//! the code only changes how loudly the drop is logged.

/// Orderly shutdown requested by the client.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Connection dropped without a close frame (reserved, never sent on the
/// wire). Transports report this when the socket fails or the handshake times
/// out.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Peer sent a close frame without a status code (reserved, never sent on
/// the wire).
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Reason string sent with [`NORMAL_CLOSURE`] on an explicit disconnect.
pub const CLIENT_DISCONNECT_REASON: &str = "Client disconnecting";

/// Returns true for the orderly shutdown code.
pub fn is_normal(code: u16) -> bool {
    code == NORMAL_CLOSURE
}
