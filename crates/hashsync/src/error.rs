//! Error types for hashsync sessions and servers.

use std::time::Duration;

use hashsync_store::StoreError;
use hashsync_sync::SyncError;
use thiserror::Error;

/// Errors that can occur while running a session or server.
#[derive(Debug, Error)]
pub enum HashsyncError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Protocol or channel error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Socket error outside of an established channel (bind, accept).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No convergence was observed in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for hashsync operations.
pub type Result<T> = std::result::Result<T, HashsyncError>;
