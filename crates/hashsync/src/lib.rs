//! # Hashsync
//!
//! Keeps a client record store and a server record store converged with a
//! cheap digest check and a full-snapshot fallback.
//!
//! ## Overview
//!
//! - **Records**: flat `{id, content, is_deleted, updated_at}` entries,
//!   deleted by tombstone
//! - **Stores**: in-memory, SQLite or Postgres behind one trait
//! - **Sessions**: one store and one channel per peer, driven by an explicit
//!   message loop
//! - **Server**: a TCP listener running one session per connection
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hashsync::{client, Record, SessionConfig};
//! use hashsync::store::MemoryStore;
//!
//! async fn example() {
//!     let store = Arc::new(MemoryStore::new());
//!     let session = client::connect("127.0.0.1:8080", store, SessionConfig::client())
//!         .await
//!         .unwrap();
//!
//!     let runner = session.clone();
//!     tokio::spawn(async move { runner.run().await });
//!
//!     session.register(Record::create("hello")).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `hashsync::core` - Records and digests
//! - `hashsync::store` - Store trait and backends
//! - `hashsync::sync` - Messages, reconciler and channels

pub mod client;
pub mod config;
pub mod error;
pub mod server;
pub mod session;

pub use hashsync_core as core;
pub use hashsync_store as store;
pub use hashsync_sync as sync;

pub use config::{open_store, ServerConfig, SessionConfig, StoreBackend, DEFAULT_ADDR};
pub use error::{HashsyncError, Result};
pub use server::SyncServer;
pub use session::{DispatchMode, Role, Session, SessionReport};

pub use hashsync_core::{root_digest, Digest, Record};
pub use hashsync_store::Store;
pub use hashsync_sync::{SyncEvent, SyncMessage};
