//! Error types for Keysieve
//!
//! One crate-level error enum covering the I/O, protocol, and configuration
//! failure classes. Uses `thiserror` for ergonomic error definitions.

use std::io;
use thiserror::Error;

use crate::snapshot::SnapshotError;

/// Main error type for proxy operations
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Underlying socket read/write error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed its connection
    #[error("Connection closed")]
    ConnectionClosed,

    /// Malformed RESP framing (bad header byte, unparsable length)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed snapshot stream
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The paired task went away and its queue closed
    #[error("Session queue closed")]
    QueueClosed,

    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// Returns true if this error ends the session rather than the process
    #[cold]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProxyError::Config(_))
    }

    /// Returns true for the quiet end-of-session cases that are logged at
    /// debug rather than error level
    pub fn is_disconnect(&self) -> bool {
        match self {
            ProxyError::ConnectionClosed | ProxyError::QueueClosed => true,
            ProxyError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
