//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Envelope or payload JSON could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A frame was not valid UTF-8.
    #[error("invalid utf-8 frame: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Envelope carried a `type` this implementation does not know.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] hashsync_store::StoreError),

    /// Transport-level error: the channel is unusable.
    #[error("transport error: {0}")]
    Transport(String),

    /// The channel was closed by the peer.
    #[error("channel closed")]
    Closed,
}

impl SyncError {
    /// Whether the session must end because of this error.
    ///
    /// Decode errors, unknown types and storage errors only abort the
    /// current message; channel errors end the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Closed)
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
