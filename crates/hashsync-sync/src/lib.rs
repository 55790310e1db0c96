//! # Hashsync Sync
//!
//! Reconciliation protocol for converging two record stores.
//!
//! ## Overview
//!
//! Each party owns one [`Store`](hashsync_store::Store). Parties compare
//! whole-state root digests; when they differ, one side pulls the other's
//! full record collection and absorbs it through its own `put` path.
//!
//! ## Key Properties
//!
//! - **Cheap check**: one digest and a count per `HashCheck`
//! - **Self-contained rounds**: no handshake state survives between rounds
//! - **Idempotent apply**: applying the same snapshot twice changes nothing
//! - **Last-write-wins**: a snapshot overwrites local records unconditionally
//!
//! ## Message Flow
//!
//! ```text
//! Party A                              Party B
//!   |-------- HASH_CHECK -------------->|   digests differ
//!   |<------- REQUEST_SNAPSHOT ---------|
//!   |-------- SNAPSHOT_DATA ----------->|   B applies every record
//!   |<------- HASH_CHECK ---------------|   confirmation
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hashsync_store::MemoryStore;
//! use hashsync_sync::{Reconciler, ReconcileConfig};
//!
//! async fn example() {
//!     let local = Reconciler::new(Arc::new(MemoryStore::new()), ReconcileConfig::default());
//!     let check = local.hash_check().await.unwrap();
//!     let frame = check.encode().unwrap();
//!     // send `frame` to the peer over any `Channel`
//! }
//! ```

pub mod convergence;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod transport;

pub use convergence::{verify_convergence, ConvergenceResult};
pub use error::{Result, SyncError};
pub use messages::{Envelope, MessageType, SnapshotPayload, SyncMessage, SyncState};
pub use protocol::{ApplyReport, ReconcileConfig, Reconciler, Step, SyncEvent};
pub use transport::{memory::MemoryChannel, tcp::TcpChannel, Channel};
