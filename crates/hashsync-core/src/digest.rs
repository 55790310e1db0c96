//! Digest engine: reduces a record collection to a single root digest.
//!
//! Encoding rules (both parties must agree on every one of them):
//!
//! - Per-record digest: `SHA-256("{id}:{content}:{is_deleted}:{updated_at}")`
//!   where `is_deleted` is `true`/`false` and `updated_at` is base-10.
//! - Records are sorted by `id` ascending before combination.
//! - Root digest: `SHA-256` over the concatenation of the per-record digests
//!   as lowercase hex text, in sorted order.
//! - The empty collection hashes to `SHA-256("")`.

use crate::record::Record;
use crate::types::Digest;

/// Root digest of an empty collection, as lowercase hex.
pub const EMPTY_DIGEST_HEX: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Digest of a single record.
pub fn record_digest(record: &Record) -> Digest {
    let text = format!(
        "{}:{}:{}:{}",
        record.id, record.content, record.is_deleted, record.updated_at
    );
    Digest::hash(text.as_bytes())
}

/// Root digest of an unordered record collection.
///
/// Pure and order-independent: any permutation of the same records yields
/// the same digest. The input is not reordered in place.
pub fn root_digest(records: &[Record]) -> Digest {
    if records.is_empty() {
        return Digest::empty();
    }

    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut combined = String::with_capacity(sorted.len() * 64);
    for record in sorted {
        combined.push_str(&record_digest(record).to_hex());
    }

    Digest::hash(combined.as_bytes())
}
