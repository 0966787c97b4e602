//! Shared test doubles: a scriptable transport and a recording listener.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::listener::SocketListener;
use crate::transport::{
    HandshakeInfo, Payload, Transport, TransportEvents, TransportFactory, close_code,
};

/// Installs a test subscriber honoring `RUST_LOG`; safe to call repeatedly.
#[allow(dead_code)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `condition` every few milliseconds until it holds.
///
/// Panics if the condition is not reached within two seconds.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within deadline");
}

// ============================================================================
// MockTransport
// ============================================================================

/// In-memory transport with scriptable dial outcomes and call counters.
pub(crate) struct MockTransport {
    events: Weak<dyn TransportEvents>,
    open: AtomicBool,
    /// Per-dial outcomes; once drained, `default_dial` applies.
    dial_script: Mutex<VecDeque<bool>>,
    default_dial: bool,
    /// When set, dials hang until the connect loop is aborted.
    block_dials: bool,
    connect_calls: AtomicUsize,
    reconnect_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    close_calls: AtomicUsize,
    sent: Mutex<Vec<Payload>>,
}

impl MockTransport {
    fn new(
        events: Weak<dyn TransportEvents>,
        dial_script: VecDeque<bool>,
        default_dial: bool,
        block_dials: bool,
    ) -> Self {
        Self {
            events,
            open: AtomicBool::new(false),
            dial_script: Mutex::new(dial_script),
            default_dial,
            block_dials,
            connect_calls: AtomicUsize::new(0),
            reconnect_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    async fn dial(&self) -> bool {
        if self.block_dials {
            std::future::pending::<()>().await;
        }

        let outcome = self
            .dial_script
            .lock()
            .pop_front()
            .unwrap_or(self.default_dial);

        if outcome {
            self.open.store(true, Ordering::SeqCst);
            self.emit_open();
        }
        outcome
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn emit_open(&self) {
        if let Some(events) = self.events.upgrade() {
            events.on_open(&HandshakeInfo {
                status: 101,
                headers: Vec::new(),
            });
        }
    }

    pub fn emit_message(&self, payload: Payload) {
        if let Some(events) = self.events.upgrade() {
            events.on_message(payload);
        }
    }

    pub fn emit_close(&self, code: i32, reason: &str, remote: bool) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(events) = self.events.upgrade() {
            events.on_close(code, reason, remote);
        }
    }

    pub fn emit_error(&self, error: &Error) {
        if let Some(events) = self.events.upgrade() {
            events.on_error(error);
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn reconnect_calls(&self) -> usize {
        self.reconnect_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Payload> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> bool {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.dial().await
    }

    async fn reconnect(&self) -> bool {
        self.reconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.dial().await
    }

    async fn send(&self, payload: Payload) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.sent.lock().push(payload);
        Ok(())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.emit_close(close_code::NORMAL, "closed by owner", false);
    }

    fn is_open(&self) -> bool {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.open.load(Ordering::SeqCst)
    }
}

// ============================================================================
// MockFactory
// ============================================================================

/// Factory handing out [`MockTransport`]s and remembering every one it made.
pub(crate) struct MockFactory {
    default_dial: bool,
    scripts: Mutex<FxHashMap<String, VecDeque<bool>>>,
    blocking: Mutex<Vec<String>>,
    transports: Mutex<FxHashMap<String, Arc<MockTransport>>>,
}

impl MockFactory {
    /// `default_dial` is the outcome of any unscripted dial attempt.
    pub fn new(default_dial: bool) -> Arc<Self> {
        Arc::new(Self {
            default_dial,
            scripts: Mutex::new(FxHashMap::default()),
            blocking: Mutex::new(Vec::new()),
            transports: Mutex::new(FxHashMap::default()),
        })
    }

    /// Scripts the outcomes of the next dials for `url`, in order.
    pub fn script_dials(&self, url: &str, outcomes: &[bool]) {
        self.scripts
            .lock()
            .insert(url.to_owned(), outcomes.iter().copied().collect());
    }

    /// Makes every dial for `url` hang until aborted.
    pub fn block_dials(&self, url: &str) {
        self.blocking.lock().push(url.to_owned());
    }

    /// Returns the transport created for `url`.
    ///
    /// Panics if no endpoint with that URL was registered.
    pub fn transport(&self, url: &str) -> Arc<MockTransport> {
        self.transports
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| panic!("no transport created for {url}"))
    }

    /// Total number of transports created.
    pub fn created_count(&self) -> usize {
        self.transports.lock().len()
    }
}

impl TransportFactory for MockFactory {
    fn create(&self, url: &str, events: Weak<dyn TransportEvents>) -> Arc<dyn Transport> {
        let script = self.scripts.lock().remove(url).unwrap_or_default();
        let block = self.blocking.lock().iter().any(|blocked| blocked == url);

        let transport = Arc::new(MockTransport::new(
            events,
            script,
            self.default_dial,
            block,
        ));
        self.transports
            .lock()
            .insert(url.to_owned(), Arc::clone(&transport));
        transport
    }
}

// ============================================================================
// RecordingListener
// ============================================================================

/// Listener recording every callback it receives.
#[derive(Default)]
pub(crate) struct RecordingListener {
    opens: AtomicUsize,
    messages: Mutex<Vec<Payload>>,
    closes: Mutex<Vec<(i32, String, bool)>>,
    errors: AtomicUsize,
}

impl RecordingListener {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<Payload> {
        self.messages.lock().clone()
    }

    pub fn closes(&self) -> Vec<(i32, String, bool)> {
        self.closes.lock().clone()
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl SocketListener for RecordingListener {
    fn on_open(&self, _handshake: &HandshakeInfo) {
        self.opens.fetch_add(1, Ordering::SeqCst);
    }

    fn on_message(&self, payload: Payload) {
        self.messages.lock().push(payload);
    }

    fn on_close(&self, code: i32, reason: &str, remote: bool) {
        self.closes.lock().push((code, reason.to_owned(), remote));
    }

    fn on_error(&self, _error: &Error) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}
