//! Streaming transport capability layer.
//!
//! The pool does not implement a wire protocol of its own — it rides on a
//! message-oriented streaming transport, consumed through the traits in
//! this module. The default implementation is [`websocket::WsTransport`];
//! tests substitute their own.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   dial / close / send    ┌──────────────────┐
//! │ ManagedConnection│─────────────────────────►│    Transport     │
//! │  (pool layer)    │◄─────────────────────────│  (this module)   │
//! └──────────────────┘   TransportEvents        └──────────────────┘
//! ```
//!
//! The pool layer drives the transport through [`Transport`]; the transport
//! pushes session events back through [`TransportEvents`]. The event sink is
//! held weakly so a session task can never keep a removed connection alive.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | Default transport over tokio-tungstenite |

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// Default WebSocket transport.
pub mod websocket;

// ============================================================================
// Close Codes
// ============================================================================

/// Session close codes.
///
/// Wire codes follow RFC 6455 but are widened to `i32` so that the
/// [`NEVER_CONNECTED`](close_code::NEVER_CONNECTED) sentinel can live
/// outside the u16 range a remote peer could ever send.
pub mod close_code {
    /// Normal closure (RFC 6455 1000).
    pub const NORMAL: i32 = 1000;

    /// Abnormal closure, no close frame received (RFC 6455 1006).
    pub const ABNORMAL: i32 = 1006;

    /// The session's handshake never completed.
    ///
    /// Emitted after a failed dial attempt. A close carrying this code must
    /// never trigger an automatic reconnect: the initial connect loop is
    /// still the active retrier, and reacting here would spawn a duplicate.
    pub const NEVER_CONNECTED: i32 = -1;
}

// ============================================================================
// Payload
// ============================================================================

/// An opaque message payload, forwarded verbatim in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Payload {
    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the text content, if this is a text payload.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data)
    }
}

// ============================================================================
// HandshakeInfo
// ============================================================================

/// Information captured from the transport handshake.
#[derive(Debug, Clone)]
pub struct HandshakeInfo {
    /// HTTP status of the upgrade response (101 on success).
    pub status: u16,
    /// Response headers as name/value pairs.
    pub headers: Vec<(String, String)>,
}

impl HandshakeInfo {
    /// Looks up a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// ============================================================================
// Transport
// ============================================================================

/// One endpoint's transport session, driven by the pool layer.
///
/// A transport is created once per registered endpoint and lives as long as
/// the connection that owns it; each dial replaces the underlying socket
/// internally. All methods are safe to call from any task.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the initial dial. Blocks the calling task until the
    /// handshake completes or fails; returns `true` on success.
    async fn connect(&self) -> bool;

    /// Performs a recovery dial after an established session dropped.
    /// Same contract as [`connect`](Transport::connect); any stale session
    /// state is torn down first.
    async fn reconnect(&self) -> bool;

    /// Sends a payload over the open session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session is not open.
    async fn send(&self, payload: Payload) -> Result<()>;

    /// Force-terminates an open session. Fire-and-forget; the resulting
    /// close is reported through [`TransportEvents::on_close`].
    fn close(&self);

    /// Non-blocking health query against cached session state.
    fn is_open(&self) -> bool;
}

// ============================================================================
// TransportEvents
// ============================================================================

/// Event sink the transport invokes on session activity.
///
/// Implemented by the pool's managed connection; the transport holds it
/// weakly and drops events once the connection is gone.
pub trait TransportEvents: Send + Sync {
    /// The session's handshake completed.
    fn on_open(&self, handshake: &HandshakeInfo);

    /// A message arrived on the session.
    fn on_message(&self, payload: Payload);

    /// The session closed.
    ///
    /// `remote` is `true` when the peer initiated the close. `code` is a
    /// [`close_code`] value; [`close_code::NEVER_CONNECTED`] marks a dial
    /// that never completed its handshake.
    fn on_close(&self, code: i32, reason: &str, remote: bool);

    /// A transport error occurred. Fatal errors are followed by a close
    /// event; this callback alone never implies the session ended.
    fn on_error(&self, error: &Error);
}

// ============================================================================
// TransportFactory
// ============================================================================

/// Creates transports for newly registered endpoints.
///
/// This is the pool's injection seam: production pools use
/// [`websocket::WsTransportFactory`], tests provide scripted transports.
pub trait TransportFactory: Send + Sync {
    /// Creates a transport for `url`, wired to the given event sink.
    ///
    /// Creation is infallible by contract; a transport for an unusable URL
    /// simply fails every dial.
    fn create(&self, url: &str, events: Weak<dyn TransportEvents>) -> Arc<dyn Transport>;
}

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::{WsTransport, WsTransportFactory};

// ============================================================================
// Tests
// ============================================================================
