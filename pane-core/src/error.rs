//! Domain-specific error types for the pane stream.
//!
//! All fallible operations return `Result<T, PaneError>`. Every error is
//! fatal for the connection it occurred on and for nothing else; transient
//! capture emptiness is modelled as `Ok(None)`, never as an error.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PaneError>;

/// The canonical error type for the pane stream.
#[derive(Debug, Error)]
pub enum PaneError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// Malformed handshake text or length prefix.
    #[error("protocol error: {0}")]
    Protocol(String),

    // ── Payload Errors ───────────────────────────────────────────
    /// A decompressed payload does not have the size the handshake promised.
    #[error("corrupt frame: expected {expected} bytes, got {actual}")]
    CorruptFrame { expected: usize, actual: usize },

    /// The block compressor rejected a payload.
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// Two buffers that must share a geometry do not.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// A send did not complete before its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// An internal channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    // ── Collaborator Errors ──────────────────────────────────────
    /// The capture backend failed in a way that is not just "no frame yet".
    #[error("capture failed: {0}")]
    Capture(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl PaneError {
    /// Whether the peer simply went away (reset, broken pipe, EOF).
    pub fn is_disconnect(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            PaneError::Connection(e) => matches!(
                e.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for PaneError {
    fn from(s: String) -> Self {
        PaneError::Other(s)
    }
}

impl From<&str> for PaneError {
    fn from(s: &str) -> Self {
        PaneError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for PaneError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        PaneError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = PaneError::Protocol("bad handshake".into());
        assert!(e.to_string().contains("bad handshake"));

        let e = PaneError::CorruptFrame {
            expected: 16,
            actual: 12,
        };
        assert!(e.to_string().contains("16"));
        assert!(e.to_string().contains("12"));
    }

    #[test]
    fn from_string() {
        let e: PaneError = "something broke".into();
        assert!(matches!(e, PaneError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: PaneError = io_err.into();
        assert!(matches!(e, PaneError::Connection(_)));
        assert!(e.is_disconnect());
    }

    #[test]
    fn protocol_error_is_not_disconnect() {
        assert!(!PaneError::Protocol("x".into()).is_disconnect());
    }
}
