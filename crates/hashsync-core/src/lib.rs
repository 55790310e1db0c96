//! # Hashsync Core
//!
//! Pure primitives for hashsync: records, digests, and the root digest engine.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over a flat record collection.
//!
//! ## Key Types
//!
//! - [`Record`] - The atomic unit of replicated state
//! - [`Digest`] - A 32-byte SHA-256 digest, hex encoded on the wire
//! - [`root_digest`] - Reduces an unordered record set to one deterministic digest
//!
//! ## Determinism
//!
//! Both parties of a reconciliation must compute identical digests for
//! identical record sets. See [`digest`] for the exact encoding rules.

pub mod digest;
pub mod error;
pub mod record;
pub mod types;

pub use digest::{record_digest, root_digest, EMPTY_DIGEST_HEX};
pub use error::{CoreError, Result};
pub use record::{now_secs, Record};
pub use types::Digest;
