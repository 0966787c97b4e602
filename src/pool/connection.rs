//! Managed connection lifecycle.
//!
//! A [`ManagedConnection`] owns exactly one endpoint's connection attempts
//! and health, isolated from every other endpoint in the pool.
//!
//! # Lifecycle
//!
//! ```text
//! created ──► connect loop ──► open ──► (unexpected close) ──► connect loop
//!                 │                            │
//!                 └── dispose: abort loop      └── dispose: close session
//! ```
//!
//! The connect loop is connect-until-success, not a persistent retry
//! daemon: once a session is established the loop terminates, and
//! event-driven close callbacks re-enter it when the session drops.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::listener::SocketListener;
use crate::transport::{
    HandshakeInfo, Payload, Transport, TransportEvents, TransportFactory, close_code,
};

// ============================================================================
// Constants
// ============================================================================

/// Fixed interval between failed connect attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(2000);

// ============================================================================
// DialMode
// ============================================================================

/// Which transport dial variant the connect loop uses next.
///
/// Some transports distinguish an initial dial from a recovery dial, so the
/// distinction is kept explicit rather than folded into a flag. The mode
/// flips to [`Reconnect`](DialMode::Reconnect) after the first attempt
/// regardless of its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialMode {
    /// No dial has been attempted yet.
    Initial,
    /// At least one dial has been attempted.
    Reconnect,
}

// ============================================================================
// ManagedConnection
// ============================================================================

/// One endpoint's live or attempted session.
///
/// Created by the pool at registration. Spawns its own detached connect
/// loop, repairs itself on unexpected session drops, and tears down
/// deterministically on [`dispose`](ManagedConnection::dispose).
pub struct ManagedConnection {
    /// Endpoint identifier, immutable.
    url: String,

    /// Owner of domain callbacks; events are forwarded for the
    /// connection's lifetime.
    listener: Arc<dyn SocketListener>,

    /// The endpoint's transport session handle.
    transport: Arc<dyn Transport>,

    /// Monotonic false→true; once set, no reconnect loop may start.
    disposed: AtomicBool,

    /// The at-most-one connect loop task. Guarded by this lock, which also
    /// orders `dispose` against `start_connect_loop`.
    connect_task: Mutex<Option<JoinHandle<()>>>,

    /// Dial variant for the next attempt.
    dial_mode: Mutex<DialMode>,

    /// Sleep between failed attempts.
    retry_interval: Duration,

    /// Back-reference for restarting the loop from event callbacks.
    self_ref: Weak<ManagedConnection>,
}

impl ManagedConnection {
    /// Creates the connection in a not-yet-connected state.
    ///
    /// Allocates and wires the transport; does not dial. The caller
    /// triggers the first attempt with
    /// [`start_connect_loop`](ManagedConnection::start_connect_loop).
    pub(crate) fn new(
        url: String,
        listener: Arc<dyn SocketListener>,
        factory: &dyn TransportFactory,
        retry_interval: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let events: Weak<dyn TransportEvents> = weak.clone();
            let transport = factory.create(&url, events);

            Self {
                url,
                listener,
                transport,
                disposed: AtomicBool::new(false),
                connect_task: Mutex::new(None),
                dial_mode: Mutex::new(DialMode::Initial),
                retry_interval,
                self_ref: weak.clone(),
            }
        })
    }

    /// Returns the endpoint identifier.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Non-blocking health query.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Sends a payload over the open session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// if the session is not currently open.
    pub async fn send(&self, payload: Payload) -> Result<()> {
        self.transport.send(payload).await
    }

    /// Starts the connect loop unless one is already running.
    ///
    /// Idempotent: a running loop makes this call a logged no-op. The loop
    /// is detached; callers never block on connection establishment.
    pub fn start_connect_loop(&self) {
        let mut task = self.connect_task.lock();

        if self.disposed.load(Ordering::SeqCst) {
            debug!(url = %self.url, "Connection disposed; not starting connect loop");
            return;
        }

        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!(url = %self.url, "Connect loop already running");
            return;
        }

        let Some(connection) = self.self_ref.upgrade() else {
            return;
        };

        debug!(url = %self.url, "Starting connect loop");
        *task = Some(tokio::spawn(async move {
            connection.connect_loop().await;
        }));
    }

    /// Connect-until-success loop body.
    ///
    /// Dial failures retry forever at a fixed interval; the only
    /// caller-visible signal of an unreachable peer is `is_open()` staying
    /// false. Both the dial and the sleep are abort points for
    /// cancellation.
    async fn connect_loop(&self) {
        info!(url = %self.url, "Connect loop started");

        loop {
            let mode = {
                let mut dial_mode = self.dial_mode.lock();
                let current = *dial_mode;
                *dial_mode = DialMode::Reconnect;
                current
            };

            let connected = match mode {
                DialMode::Initial => self.transport.connect().await,
                DialMode::Reconnect => self.transport.reconnect().await,
            };

            if connected {
                info!(url = %self.url, "Connected");
                break;
            }

            debug!(
                url = %self.url,
                retry_ms = self.retry_interval.as_millis() as u64,
                "Connect attempt failed; retrying"
            );
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    /// Tears the connection down. Idempotent; only the first call acts.
    ///
    /// A running connect loop is cancelled and nothing else happens — it
    /// has not produced a session yet, so there is nothing to close. With
    /// no loop running, an open session is closed immediately.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        debug!(url = %self.url, "Disposing connection");

        let mut task = self.connect_task.lock();
        if let Some(handle) = task.take() {
            if !handle.is_finished() {
                debug!(url = %self.url, "Cancelling connect loop");
                handle.abort();
                return;
            }
        }
        drop(task);

        if self.transport.is_open() {
            debug!(url = %self.url, "Closing open session");
            self.transport.close();
        }
    }
}

// ============================================================================
// TransportEvents Implementation
// ============================================================================

impl TransportEvents for ManagedConnection {
    fn on_open(&self, handshake: &HandshakeInfo) {
        debug!(url = %self.url, status = handshake.status, "Session opened");
        self.listener.on_open(handshake);
    }

    fn on_message(&self, payload: Payload) {
        self.listener.on_message(payload);
    }

    fn on_close(&self, code: i32, reason: &str, remote: bool) {
        self.listener.on_close(code, reason, remote);

        if self.disposed.load(Ordering::SeqCst) {
            debug!(url = %self.url, "Closed after dispose; staying down");
            return;
        }

        if code == close_code::NEVER_CONNECTED {
            // The initial connect loop is still the active retrier for a
            // handshake that never completed.
            debug!(url = %self.url, "Handshake never completed; connect loop owns the retry");
            return;
        }

        info!(url = %self.url, code, remote, "Session dropped; scheduling reconnect");
        self.start_connect_loop();
    }

    fn on_error(&self, error: &Error) {
        self.listener.on_error(error);
    }
}

impl fmt::Debug for ManagedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedConnection")
            .field("url", &self.url)
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
