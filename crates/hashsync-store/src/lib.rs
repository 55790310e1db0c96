//! # Hashsync Store
//!
//! Storage capability for hashsync. Provides a trait-based interface for
//! record persistence with interchangeable backends.
//!
//! ## Overview
//!
//! The reconciliation protocol only ever talks to the [`Store`] trait, so any
//! backend can sit behind either party. Every backend must produce
//! bit-identical digests for the same logical record set.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`MemoryStore`] - Volatile map behind a reader/writer lock
//! - [`SqliteStore`] - Embedded single-file storage
//! - `PostgresStore` - Networked relational storage (feature `postgres`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hashsync_core::Record;
//! use hashsync_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("records.db").unwrap();
//!     store.put(&Record::new("1", "hello", 1000)).await.unwrap();
//!     let digest = store.state_digest().await.unwrap();
//!     println!("{digest}");
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Last-write-wins**: `put` replaces any record with the same id, no merge
//! - **No physical deletes**: deletion is a tombstone written through `put`
//! - **Uncached digests**: `state_digest` rescans on every call

pub mod error;
pub mod memory;
pub mod migration;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use traits::Store;
