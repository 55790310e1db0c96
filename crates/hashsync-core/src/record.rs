//! The record: atomic unit of replicated state.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::digest::record_digest;
use crate::types::Digest;

/// A single record in the replicated collection.
///
/// Two records with equal `id` are the same logical entity. Deletion is a
/// tombstone (`is_deleted = true`), never a physical removal, so deletions
/// travel through the same digest/snapshot path as any other update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier, immutable once assigned.
    pub id: String,
    /// Opaque content.
    pub content: String,
    /// Logical tombstone flag.
    pub is_deleted: bool,
    /// Last update time (Unix seconds).
    pub updated_at: i64,
}

impl Record {
    /// Create a live record.
    pub fn new(id: impl Into<String>, content: impl Into<String>, updated_at: i64) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            is_deleted: false,
            updated_at,
        }
    }

    /// Create a live record with a fresh random id, stamped with the current time.
    pub fn create(content: impl Into<String>) -> Self {
        let id: [u8; 16] = rand::thread_rng().gen();
        Self::new(hex::encode(id), content, now_secs())
    }

    /// Mark this record deleted at the given time.
    pub fn tombstone(mut self, at: i64) -> Self {
        self.is_deleted = true;
        self.updated_at = at;
        self
    }

    /// Replace the content at the given time.
    pub fn with_content(mut self, content: impl Into<String>, at: i64) -> Self {
        self.content = content.into();
        self.updated_at = at;
        self
    }

    /// Per-record digest. See [`record_digest`].
    pub fn digest(&self) -> Digest {
        record_digest(self)
    }
}

/// Current time in Unix seconds.
pub fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
