//! Error taxonomy of the bridge.
//!
//! None of these errors are recovered locally: the bridge relies on exact lock-step
//! alternation with the simulator, so any of them is surfaced to the caller of
//! `reset`/`step` or ends the listener's serve loop.

use thiserror::Error;

use crate::message::MessageType;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The observed message type does not match what the episode state machine expects.
    #[error("protocol desync: expected {expected}, got {got:?}")]
    ProtocolDesync {
        /// What the current state accepts.
        expected: &'static str,
        /// What was actually received.
        got: MessageType,
    },

    /// Framing, JSON or validation failure on an inbound payload.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The simulator closed or reset the connection.
    #[error("connection terminated by peer")]
    ConnectionTerminated,

    /// A socket frame declared more bytes than the receive capacity.
    #[error("oversized message: {size} bytes (capacity {capacity})")]
    OversizedMessage {
        /// Declared payload length.
        size: usize,
        /// Configured receive capacity.
        capacity: usize,
    },

    /// A mailbox lost its other end.
    #[error("mailbox closed")]
    MailboxClosed,

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Underlying I/O failure that is not a peer disconnect.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload(reason.into())
    }

    /// Map an I/O error, turning peer disconnects into [`BridgeError::ConnectionTerminated`].
    pub(crate) fn from_read(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => Self::ConnectionTerminated,
            _ => Self::Io(e),
        }
    }

    /// True for errors that end a serve loop without being a fault.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionTerminated)
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedPayload(format!("invalid JSON: {e}"))
    }
}
