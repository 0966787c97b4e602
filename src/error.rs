//! Error types for the connection pool.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_pool::{ConnectionPool, Result};
//!
//! async fn example(pool: &ConnectionPool) -> Result<()> {
//!     let connection = pool.select_active()?;
//!     connection.send("ping".into()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Selection | [`Error::NoAvailableConnection`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`] |
//! | Configuration | [`Error::InvalidUrl`] |
//! | External | [`Error::Io`], [`Error::WebSocket`] |
//!
//! Duplicate endpoint registration is deliberately NOT an error variant:
//! [`ConnectionPool::register`](crate::ConnectionPool::register) reports it
//! as a `bool`, since rejecting a duplicate is an expected soft outcome.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Selection Errors
    // ========================================================================
    /// No connection is currently available for selection.
    ///
    /// Returned when the pool is empty or every registered connection is
    /// unhealthy. This is an expected, transient condition: connections
    /// repair themselves in the background, so callers should retry later
    /// rather than treat this as fatal.
    #[error("No available connection in the pool")]
    NoAvailableConnection,

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport-level connection failure.
    ///
    /// Reported through the listener's error callback; dial failures are
    /// otherwise absorbed by the per-connection retry loop.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The session closed underneath an operation.
    ///
    /// Returned when sending on a connection that is no longer open.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Endpoint URL failed to parse or has an unsupported scheme.
    #[error("Invalid endpoint URL: {url}")]
    InvalidUrl {
        /// The offending URL string.
        url: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is transient and worth retrying.
    ///
    /// [`Error::NoAvailableConnection`] always is: connections repair
    /// themselves, so a later selection may succeed without any caller
    /// intervention.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoAvailableConnection | Self::Connection { .. } | Self::ConnectionClosed
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
