//! Golden digest vectors.
//!
//! Every party must reduce these record sets to exactly these digests, or
//! two stores with identical content will never be seen as in sync.

use hashsync_core::{record_digest, root_digest, Record, EMPTY_DIGEST_HEX};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Input records, in the order given to the digest engine.
    pub records: Vec<Record>,
    /// Expected per-record digests (hex), in input order.
    pub expected_records: Vec<&'static str>,
    /// Expected root digest (hex).
    pub expected_root: &'static str,
}

const HELLO: &str = "622c89008cfd35fb003ac3586db6f18af58dbba4eff43c13b39374464f5929f5";
const WORLD_DELETED: &str = "624fa52737c8ff6e1df99d04ae3165721f747673066f11d4d7a5d7971d8b3b4c";
const HELLO_DELETED: &str = "443e1c8cfbe9ff08a0d2b46e6a728a825a7a6632728ce03c8bed642b342e98c3";

fn hello() -> Record {
    Record::new("1", "hello", 1000)
}

fn world_deleted() -> Record {
    Record::new("2", "world", 2000).tombstone(2000)
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty collection",
            records: vec![],
            expected_records: vec![],
            expected_root: EMPTY_DIGEST_HEX,
        },
        GoldenVector {
            name: "single live record",
            records: vec![hello()],
            expected_records: vec![HELLO],
            expected_root: "2abac54469fa3598a86baf972fc32de4c3a8677a16886d8a8c02330ad95b552a",
        },
        GoldenVector {
            name: "single tombstone",
            records: vec![hello().tombstone(1001)],
            expected_records: vec![HELLO_DELETED],
            expected_root: "e68adcba2b7eefb1f9df27730a407aeaeb135daad715a47036c127bcf0265356",
        },
        GoldenVector {
            name: "two records, sorted input",
            records: vec![hello(), world_deleted()],
            expected_records: vec![HELLO, WORLD_DELETED],
            expected_root: "f90faca97c02e496160eaa6aa653320279406ce0c7aabac7d671dc101531b2ce",
        },
        GoldenVector {
            name: "two records, reversed input",
            records: vec![world_deleted(), hello()],
            expected_records: vec![WORLD_DELETED, HELLO],
            expected_root: "f90faca97c02e496160eaa6aa653320279406ce0c7aabac7d671dc101531b2ce",
        },
    ]
}

/// Check every vector, returning the name of the first one that fails.
pub fn verify_all_vectors() -> Result<(), String> {
    for vector in all_vectors() {
        let records: Vec<String> = vector.records.iter().map(|r| record_digest(r).to_hex()).collect();
        if records != vector.expected_records {
            return Err(format!("{}: record digests differ", vector.name));
        }
        if root_digest(&vector.records).to_hex() != vector.expected_root {
            return Err(format!("{}: root digest differs", vector.name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_verify() {
        verify_all_vectors().unwrap();
    }

    #[test]
    fn test_vector_names_unique() {
        let vectors = all_vectors();
        let mut names: Vec<_> = vectors.iter().map(|v| v.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), vectors.len());
    }
}
