//! Default WebSocket transport over tokio-tungstenite.
//!
//! One [`WsTransport`] is created per registered endpoint and lives for the
//! lifetime of its managed connection. Each successful dial installs a fresh
//! session: a spawned task that owns the socket, routes incoming frames to
//! the [`TransportEvents`] sink, and services send/shutdown commands from
//! the transport handle.
//!
//! # Session Task
//!
//! The session task handles:
//!
//! - Incoming frames (text, binary, close) from the peer
//! - Outgoing payloads submitted through [`Transport::send`]
//! - Shutdown commands from [`Transport::close`]
//!
//! # Dial Failure Contract
//!
//! A dial that never completes its handshake reports `on_error` followed by
//! `on_close` with [`close_code::NEVER_CONNECTED`]. The sentinel tells the
//! pool layer that the still-running connect loop owns the retry, so no
//! second reconnect loop may be started in response.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{HandshakeInfo, Payload, Transport, TransportEvents, TransportFactory, close_code};

// ============================================================================
// Types
// ============================================================================

/// Client-side WebSocket stream type.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands submitted to the session task.
enum SessionCommand {
    /// Send a frame and report the outcome.
    Send(Message, oneshot::Sender<Result<()>>),
    /// Close the session locally.
    Shutdown,
}

/// One installed session: the live socket's control surface.
struct Session {
    /// Channel to the session task.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Cached health flag, shared with the session task.
    open: Arc<AtomicBool>,
    /// Session task handle, aborted when the session is replaced.
    task: JoinHandle<()>,
}

// ============================================================================
// WsTransport
// ============================================================================

/// WebSocket [`Transport`] implementation.
///
/// The transport object persists across dials; the socket underneath it is
/// replaced on every connect or reconnect attempt.
pub struct WsTransport {
    /// Endpoint URL, immutable.
    url: String,
    /// Event sink, held weakly so a session task never outlives its owner.
    events: Weak<dyn TransportEvents>,
    /// Currently installed session, if any.
    session: Mutex<Option<Session>>,
}

impl WsTransport {
    /// Creates a transport for `url` wired to the given event sink.
    ///
    /// Does not dial; the first [`connect`](Transport::connect) does.
    #[must_use]
    pub fn new(url: impl Into<String>, events: Weak<dyn TransportEvents>) -> Self {
        Self {
            url: url.into(),
            events,
            session: Mutex::new(None),
        }
    }

    /// Returns `true` if `url` parses as a `ws://` or `wss://` URL.
    #[must_use]
    pub fn url_is_valid(url: &str) -> bool {
        Url::parse(url)
            .map(|parsed| matches!(parsed.scheme(), "ws" | "wss"))
            .unwrap_or(false)
    }

    /// Dials the endpoint, replacing any stale session.
    async fn dial(&self, reconnecting: bool) -> bool {
        self.teardown_stale();

        if !Self::url_is_valid(&self.url) {
            debug!(url = %self.url, "Refusing to dial invalid URL");
            self.emit_error(&Error::invalid_url(&self.url));
            self.emit_close(close_code::NEVER_CONNECTED, "invalid endpoint URL", false);
            return false;
        }

        debug!(url = %self.url, reconnecting, "Dialing");

        match connect_async(self.url.as_str()).await {
            Ok((stream, response)) => {
                let handshake = HandshakeInfo {
                    status: response.status().as_u16(),
                    headers: response
                        .headers()
                        .iter()
                        .map(|(name, value)| {
                            (
                                name.to_string(),
                                String::from_utf8_lossy(value.as_bytes()).into_owned(),
                            )
                        })
                        .collect(),
                };

                self.install_session(stream);
                info!(url = %self.url, status = handshake.status, "WebSocket session established");
                self.emit_open(&handshake);
                true
            }
            Err(error) => {
                debug!(url = %self.url, error = %error, "Dial failed");
                self.emit_error(&Error::WebSocket(error));
                self.emit_close(close_code::NEVER_CONNECTED, "handshake never completed", false);
                false
            }
        }
    }

    /// Tears down a previous session without emitting events.
    ///
    /// The close that made the session stale was already reported; aborting
    /// here only reclaims the task.
    fn teardown_stale(&self) {
        if let Some(session) = self.session.lock().take() {
            session.open.store(false, Ordering::SeqCst);
            session.task.abort();
            trace!(url = %self.url, "Stale session torn down");
        }
    }

    /// Installs a fresh session over `stream` and spawns its task.
    fn install_session(&self, stream: WsStream) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(Self::run_session(
            stream,
            command_rx,
            Arc::clone(&open),
            self.url.clone(),
            self.events.clone(),
        ));

        *self.session.lock() = Some(Session {
            command_tx,
            open,
            task,
        });
    }

    /// Session task: owns the socket until it closes.
    async fn run_session(
        stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        open: Arc<AtomicBool>,
        url: String,
        events: Weak<dyn TransportEvents>,
    ) {
        let (mut ws_write, mut ws_read) = stream.split();

        let (code, reason, remote) = loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            emit_message(&events, Payload::Text(text.as_str().to_owned()));
                        }

                        Some(Ok(Message::Binary(data))) => {
                            emit_message(&events, Payload::Binary(data.to_vec()));
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(url = %url, "Session closed by remote");
                            let (code, reason) = frame
                                .map(|frame| {
                                    (
                                        i32::from(u16::from(frame.code)),
                                        frame.reason.as_str().to_owned(),
                                    )
                                })
                                .unwrap_or((close_code::ABNORMAL, String::new()));
                            break (code, reason, true);
                        }

                        Some(Err(error)) => {
                            warn!(url = %url, error = %error, "Session error");
                            emit_error_to(&events, &Error::WebSocket(error));
                            break (close_code::ABNORMAL, "transport error".to_owned(), true);
                        }

                        None => {
                            debug!(url = %url, "Session stream ended");
                            break (close_code::ABNORMAL, "stream ended".to_owned(), true);
                        }

                        // Ping, Pong and raw frames handled by tungstenite.
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Send(message, reply_tx)) => {
                            let result = ws_write.send(message).await.map_err(Error::WebSocket);
                            let _ = reply_tx.send(result);
                        }

                        Some(SessionCommand::Shutdown) => {
                            debug!(url = %url, "Session shutdown requested");
                            let _ = ws_write.close().await;
                            break (close_code::NORMAL, "closed by owner".to_owned(), false);
                        }

                        None => {
                            // Transport dropped; nothing left to notify.
                            let _ = ws_write.close().await;
                            return;
                        }
                    }
                }
            }
        };

        open.store(false, Ordering::SeqCst);

        if let Some(events) = events.upgrade() {
            events.on_close(code, &reason, remote);
        }

        trace!(url = %url, code, remote, "Session task terminated");
    }

    /// Forwards an open event to the sink, if still alive.
    fn emit_open(&self, handshake: &HandshakeInfo) {
        if let Some(events) = self.events.upgrade() {
            events.on_open(handshake);
        }
    }

    /// Forwards an error to the sink, if still alive.
    fn emit_error(&self, error: &Error) {
        emit_error_to(&self.events, error);
    }

    /// Forwards a close event to the sink, if still alive.
    fn emit_close(&self, code: i32, reason: &str, remote: bool) {
        if let Some(events) = self.events.upgrade() {
            events.on_close(code, reason, remote);
        }
    }
}

/// Forwards a message to the sink, if still alive.
fn emit_message(events: &Weak<dyn TransportEvents>, payload: Payload) {
    if let Some(events) = events.upgrade() {
        events.on_message(payload);
    }
}

/// Forwards an error to the sink, if still alive.
fn emit_error_to(events: &Weak<dyn TransportEvents>, error: &Error) {
    if let Some(events) = events.upgrade() {
        events.on_error(error);
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> bool {
        self.dial(false).await
    }

    async fn reconnect(&self) -> bool {
        self.dial(true).await
    }

    async fn send(&self, payload: Payload) -> Result<()> {
        let command_tx = {
            let session = self.session.lock();
            match session.as_ref() {
                Some(session) if session.open.load(Ordering::SeqCst) => {
                    session.command_tx.clone()
                }
                _ => return Err(Error::ConnectionClosed),
            }
        };

        let message = match payload {
            Payload::Text(text) => Message::Text(text.into()),
            Payload::Binary(data) => Message::Binary(data.into()),
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        command_tx
            .send(SessionCommand::Send(message, reply_tx))
            .map_err(|_| Error::ConnectionClosed)?;

        reply_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    fn close(&self) {
        let session = self.session.lock();
        if let Some(session) = session.as_ref() {
            let _ = session.command_tx.send(SessionCommand::Shutdown);
        }
    }

    fn is_open(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| session.open.load(Ordering::SeqCst))
    }
}

// ============================================================================
// WsTransportFactory
// ============================================================================

/// [`TransportFactory`] producing [`WsTransport`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransportFactory;

impl TransportFactory for WsTransportFactory {
    fn create(&self, url: &str, events: Weak<dyn TransportEvents>) -> Arc<dyn Transport> {
        if !WsTransport::url_is_valid(url) {
            warn!(url, "Endpoint URL is not a valid ws:// or wss:// URL; dials will fail");
        }
        Arc::new(WsTransport::new(url, events))
    }
}

// ============================================================================
// Tests
// ============================================================================
