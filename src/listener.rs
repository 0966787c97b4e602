//! Caller-facing event listener.
//!
//! A [`SocketListener`] is supplied at registration time and receives every
//! transport event observed by that endpoint's managed connection, for the
//! connection's whole lifetime — across reconnects, until the endpoint is
//! removed from the pool.

// ============================================================================
// Imports
// ============================================================================

use crate::error::Error;
use crate::transport::{HandshakeInfo, Payload};

// ============================================================================
// SocketListener
// ============================================================================

/// Domain callbacks invoked by the pool on transport events.
///
/// All methods default to no-ops so implementors only handle the events
/// they care about. Callbacks run on the connection's session task; keep
/// them short and non-blocking.
pub trait SocketListener: Send + Sync {
    /// A session to the endpoint was established.
    ///
    /// Fires once per successful dial — again after every reconnect.
    fn on_open(&self, handshake: &HandshakeInfo) {
        let _ = handshake;
    }

    /// A message arrived, forwarded verbatim.
    fn on_message(&self, payload: Payload) {
        let _ = payload;
    }

    /// The session closed.
    ///
    /// `remote` is `true` when the peer initiated the close. The pool
    /// decides separately whether a reconnect follows; listeners observe
    /// only.
    fn on_close(&self, code: i32, reason: &str, remote: bool) {
        let _ = (code, reason, remote);
    }

    /// A transport error occurred.
    fn on_error(&self, error: &Error) {
        let _ = error;
    }
}
