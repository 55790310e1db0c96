//! # Hashsync Testkit
//!
//! Testing utilities for hashsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed record sets with their expected digests
//! - **Generators**: Proptest strategies for records and record sets
//! - **Fixtures**: Pre-populated stores and connected party pairs
//!
//! ## Golden Vectors
//!
//! ```rust
//! use hashsync_testkit::vectors::{all_vectors, verify_all_vectors};
//!
//! for vector in all_vectors() {
//!     println!("{}: {}", vector.name, vector.expected_root);
//! }
//! assert!(verify_all_vectors().is_ok());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use hashsync_testkit::generators::record_set;
//!
//! proptest! {
//!     #[test]
//!     fn digest_is_deterministic(records in record_set(16)) {
//!         prop_assert_eq!(root_digest(&records), root_digest(&records));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use hashsync_testkit::fixtures::{hello_record, TestFixture};
//!
//! let fixture = TestFixture::with_records(vec![hello_record()]);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{hello_record, sample_records, Backend, TestFixture};
pub use generators::{record, record_set};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
