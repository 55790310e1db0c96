//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use hashsync_core::Record;

/// Generate a record id.
pub fn record_id() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,12}".prop_map(String::from)
}

/// Generate record content, including the field delimiter.
pub fn content() -> impl Strategy<Value = String> {
    "[ -~]{0,32}".prop_map(String::from)
}

/// Generate a reasonable timestamp (Unix seconds).
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800i64
}

/// Generate a record, live or tombstoned.
pub fn record() -> impl Strategy<Value = Record> {
    (record_id(), content(), any::<bool>(), timestamp()).prop_map(
        |(id, content, is_deleted, updated_at)| Record {
            id,
            content,
            is_deleted,
            updated_at,
        },
    )
}

/// Generate a collection of records with distinct ids.
pub fn record_set(max_len: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(record(), 0..=max_len).prop_map(|records| {
        records
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect()
    })
}

/// Generate a record set together with a shuffled copy of it.
pub fn record_set_and_permutation(
    max_len: usize,
) -> impl Strategy<Value = (Vec<Record>, Vec<Record>)> {
    record_set(max_len).prop_flat_map(|records| {
        let shuffled = Just(records.clone()).prop_shuffle();
        (Just(records), shuffled)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashsync_core::root_digest;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn record_set_ids_unique(records in record_set(24)) {
            let ids: HashSet<_> = records.iter().map(|r| r.id.as_str()).collect();
            prop_assert_eq!(ids.len(), records.len());
        }

        #[test]
        fn root_digest_ignores_order((records, shuffled) in record_set_and_permutation(24)) {
            prop_assert_eq!(root_digest(&records), root_digest(&shuffled));
        }

        #[test]
        fn tombstoning_changes_digest(r in record()) {
            let flipped = Record { is_deleted: !r.is_deleted, ..r.clone() };
            prop_assert_ne!(root_digest(&[r]), root_digest(&[flipped]));
        }
    }
}
