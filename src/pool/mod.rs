//! Connection pool: registry plus selection policy.
//!
//! The pool owns a concurrent registry of [`ManagedConnection`] keyed by
//! endpoint URL. Each registered endpoint repairs its connection
//! independently and indefinitely; the pool's job is membership and fair
//! selection among whatever happens to be healthy right now.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │              ConnectionPool               │
//! │  ┌─────────────────────────────────────┐  │
//! │  │ ws://a → ManagedConnection (open)   │  │
//! │  │ ws://b → ManagedConnection (retry)  │  │
//! │  │ ws://c → ManagedConnection (open)   │  │
//! │  └─────────────────────────────────────┘  │
//! │        select_active: shuffle + probe     │
//! └───────────────────────────────────────────┘
//! ```
//!
//! # Selection
//!
//! [`select_active`](ConnectionPool::select_active) snapshots the current
//! identifiers, shuffles them with a single shared random source
//! (Fisher–Yates), and probes in permuted order for the first open
//! connection. The permutation is regenerated on every call, so across many
//! calls every healthy connection is returned with equal probability and
//! none is starved.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Per-endpoint lifecycle and reconnect loop |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::listener::SocketListener;
use crate::transport::TransportFactory;
use crate::transport::websocket::WsTransportFactory;

// ============================================================================
// Submodules
// ============================================================================

/// Per-endpoint connection lifecycle.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ManagedConnection, RETRY_INTERVAL};

// ============================================================================
// ConnectionPool
// ============================================================================

/// Registry of managed connections with uniform-random selection.
///
/// Thread-safe; `register`, `remove`, `select_active` and `active_count`
/// may be called concurrently from any task. Per-connection reconnect
/// loops never touch the registry.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use ws_pool::{ConnectionPool, SocketListener};
///
/// struct Printer;
/// impl SocketListener for Printer {}
///
/// let pool = ConnectionPool::new();
/// pool.register("ws://feed-1.example.com", Arc::new(Printer));
/// pool.register("ws://feed-2.example.com", Arc::new(Printer));
///
/// // Later, once something is connected:
/// let connection = pool.select_active()?;
/// connection.send("subscribe".into()).await?;
/// # ws_pool::Result::Ok(())
/// ```
pub struct ConnectionPool {
    /// Registry of managed connections by endpoint URL.
    connections: RwLock<FxHashMap<String, Arc<ManagedConnection>>>,

    /// Transport factory for newly registered endpoints.
    factory: Arc<dyn TransportFactory>,

    /// Fixed retry interval handed to each connection.
    retry_interval: Duration,

    /// Shared random source for selection shuffles.
    rng: Mutex<StdRng>,
}

impl ConnectionPool {
    /// Creates a pool using the default WebSocket transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_factory(Arc::new(WsTransportFactory))
    }

    /// Creates a pool with a custom transport factory.
    #[must_use]
    pub fn with_factory(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            connections: RwLock::new(FxHashMap::default()),
            factory,
            retry_interval: RETRY_INTERVAL,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Overrides the fixed retry interval for subsequently registered
    /// endpoints.
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

// ============================================================================
// ConnectionPool - Registry
// ============================================================================

impl ConnectionPool {
    /// Registers an endpoint and starts connecting to it.
    ///
    /// Returns `false` without any mutation if `url` is already
    /// registered — duplicates are rejected, not merged or replaced. The
    /// duplicate check and the insertion happen under one write lock, so
    /// no two concurrent registrations for the same URL can both succeed.
    ///
    /// On success the connection's connect loop starts immediately; this
    /// call does not wait for the connection to establish.
    pub fn register(&self, url: impl Into<String>, listener: Arc<dyn SocketListener>) -> bool {
        let url = url.into();
        let mut connections = self.connections.write();

        if connections.contains_key(&url) {
            warn!(url = %url, "Endpoint already registered");
            return false;
        }

        let connection = ManagedConnection::new(
            url.clone(),
            listener,
            self.factory.as_ref(),
            self.retry_interval,
        );
        connections.insert(url.clone(), Arc::clone(&connection));
        connection.start_connect_loop();

        debug!(url = %url, "Endpoint registered");
        true
    }

    /// Removes an endpoint and disposes its connection.
    ///
    /// No-op for an unknown URL; never errors.
    pub fn remove(&self, url: &str) {
        let removed = { self.connections.write().remove(url) };

        if let Some(connection) = removed {
            connection.dispose();
            debug!(url, "Endpoint removed from pool");
        }
    }

    /// Returns the number of registered endpoints, healthy or not.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns `true` if no endpoints are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

// ============================================================================
// ConnectionPool - Selection
// ============================================================================

impl ConnectionPool {
    /// Selects one currently open connection, uniformly at random.
    ///
    /// Snapshots the registered identifiers, shuffles the snapshot with
    /// the shared random source, and probes each connection's cached
    /// health flag in permuted order. An identifier removed between
    /// snapshot and probe is skipped, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAvailableConnection`] if the pool is empty or no
    /// probed connection is open. Both are transient: connections repair
    /// themselves, so retrying later may succeed.
    pub fn select_active(&self) -> Result<Arc<ManagedConnection>> {
        let mut urls: Vec<String> = {
            let connections = self.connections.read();
            connections.keys().cloned().collect()
        };

        if urls.is_empty() {
            return Err(Error::NoAvailableConnection);
        }

        {
            let mut rng = self.rng.lock();
            urls.shuffle(&mut *rng);
        }

        for url in &urls {
            // The entry may have vanished since the snapshot was taken.
            let Some(connection) = self.connections.read().get(url).cloned() else {
                continue;
            };

            if connection.is_open() {
                trace!(url = %url, "Selected active connection");
                return Ok(connection);
            }
        }

        Err(Error::NoAvailableConnection)
    }

    /// Counts connections whose session is currently open.
    ///
    /// Reads only cached health flags; never blocks on I/O.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.connections
            .read()
            .values()
            .filter(|connection| connection.is_open())
            .count()
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
