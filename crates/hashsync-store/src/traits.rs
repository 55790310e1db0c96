//! Store trait: the abstract interface for record persistence.
//!
//! This trait keeps the protocol storage-agnostic. Implementations
//! include an in-memory map, SQLite, and Postgres.

use std::sync::Arc;

use async_trait::async_trait;
use hashsync_core::{root_digest, Digest, Record};

use crate::error::Result;

/// The Store trait: async interface for record persistence.
///
/// All methods are async so blocking backends (SQLite) can move their work
/// off the runtime with `spawn_blocking`.
///
/// # Design Notes
///
/// - **Last-write-wins**: `put` unconditionally replaces the record with the
///   same id. There is no timestamp comparison.
/// - **Not found**: `get` on a missing id returns [`StoreError::NotFound`].
/// - **Fresh digests**: `state_digest` is never cached.
///
/// [`StoreError::NotFound`]: crate::StoreError::NotFound
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or overwrite a record.
    async fn put(&self, record: &Record) -> Result<()>;

    /// Get a record by id.
    async fn get(&self, id: &str) -> Result<Record>;

    /// All records, in no particular order.
    async fn list_all(&self) -> Result<Vec<Record>>;

    /// Number of records, tombstones included.
    async fn count(&self) -> Result<usize> {
        Ok(self.list_all().await?.len())
    }

    /// Root digest of the full record set, recomputed from a fresh scan.
    async fn state_digest(&self) -> Result<Digest> {
        let records = self.list_all().await?;
        Ok(root_digest(&records))
    }
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn put(&self, record: &Record) -> Result<()> {
        (**self).put(record).await
    }

    async fn get(&self, id: &str) -> Result<Record> {
        (**self).get(id).await
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        (**self).list_all().await
    }

    async fn count(&self) -> Result<usize> {
        (**self).count().await
    }

    async fn state_digest(&self) -> Result<Digest> {
        (**self).state_digest().await
    }
}
