//! Error types for hashsync core.

use thiserror::Error;

/// Core errors.
///
/// Digest computation itself never fails; these only arise when parsing
/// digests received from outside the process.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid digest hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid digest length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
