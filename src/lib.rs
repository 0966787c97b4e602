//! Self-healing WebSocket connection pool.
//!
//! This library maintains a set of named remote endpoints over a
//! persistent, message-oriented streaming transport. Each endpoint's
//! connection is established and repaired independently and indefinitely;
//! the pool selects one currently healthy connection, uniformly at random,
//! for outbound traffic.
//!
//! # Architecture
//!
//! Key design principles:
//!
//! - Each [`ManagedConnection`] owns: one endpoint's session + one detached
//!   connect-until-success loop
//! - Unexpected session drops re-enter the connect loop automatically;
//!   owner-initiated teardown never does
//! - Selection is shuffle-and-probe with a fresh permutation per call —
//!   every healthy connection is equally likely, none is starved
//! - The wire transport is a consumed capability behind the [`Transport`]
//!   trait; [`WsTransport`] is the tokio-tungstenite default
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ws_pool::{ConnectionPool, Payload, Result, SocketListener};
//!
//! struct Printer;
//!
//! impl SocketListener for Printer {
//!     fn on_message(&self, payload: Payload) {
//!         if let Some(text) = payload.as_text() {
//!             println!("received: {text}");
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let pool = ConnectionPool::new();
//!
//!     pool.register("ws://feed-1.example.com/stream", Arc::new(Printer));
//!     pool.register("ws://feed-2.example.com/stream", Arc::new(Printer));
//!
//!     // Connections establish in the background; pick a healthy one.
//!     let connection = pool.select_active()?;
//!     connection.send("subscribe".into()).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`listener`] | Caller-implemented event callbacks |
//! | [`pool`] | [`ConnectionPool`] and [`ManagedConnection`] |
//! | [`transport`] | Transport capability traits and WebSocket default |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Caller-implemented event callbacks.
///
/// Implement [`SocketListener`] to observe transport events per endpoint.
pub mod listener;

/// Connection pool and per-endpoint connection lifecycle.
pub mod pool;

/// Streaming transport capability layer.
///
/// The traits the pool consumes, plus the default WebSocket transport.
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Listener capability
pub use listener::SocketListener;

// Pool types
pub use pool::{ConnectionPool, ManagedConnection, RETRY_INTERVAL};

// Transport types
pub use transport::{
    HandshakeInfo, Payload, Transport, TransportEvents, TransportFactory, WsTransport,
    WsTransportFactory, close_code,
};
