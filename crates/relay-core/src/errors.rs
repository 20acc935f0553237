//! Error taxonomy for the relay.
//!
//! Connection-level failures never spread past the connection they hit:
//!
//! - [`ReceiveError`]: terminal for the reading connection (peer close,
//!   transport fault, malformed payload)
//! - [`SendError`]: terminal for one recipient during a broadcast
//! - [`RelayError`]: failures at the server boundary (upgrade, bind,
//!   encoding)

use thiserror::Error;

/// Why an inbound read ended. All variants are terminal for the connection.
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The peer closed the channel (Close frame or end of stream).
    #[error("connection closed by peer")]
    Closed,
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// The payload did not decode as a message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A binary frame that is not valid UTF-8.
    #[error("binary frame is not valid UTF-8")]
    NonUtf8,
}

impl ReceiveError {
    /// Whether this was an orderly close rather than a fault.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Failure to hand a message to one recipient.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The connection is closed or its writer has exited.
    #[error("connection is closed")]
    Closed,
}

/// Top-level relay error.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The HTTP request could not be promoted to a WebSocket.
    #[error("WebSocket upgrade failed: {0}")]
    Upgrade(String),
    /// `listen` was called on a server that is already serving.
    #[error("server is already listening")]
    AlreadyListening,
    /// Socket or bind failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A message could not be encoded.
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
