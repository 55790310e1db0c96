//! In-memory implementation of the Store trait.
//!
//! Volatile: everything is lost when the store is dropped. Reads share the
//! lock, writes take it exclusively.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use hashsync_core::Record;

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
pub struct MemoryStore {
    records: RwLock<HashMap<String, Record>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store pre-populated with records, applied in order.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect::<HashMap<_, _>>();
        Self {
            records: RwLock::new(map),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Record>>> {
        self.records
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Record>>> {
        self.records
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, record: &Record) -> Result<()> {
        let mut records = self.write()?;
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Record> {
        let records = self.read()?;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        let records = self.read()?;
        Ok(records.values().cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashsync_core::EMPTY_DIGEST_HEX;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::new();
        let record = Record::new("1", "hello", 1000);

        store.put(&record).await.unwrap();

        assert_eq!(store.get("1").await.unwrap(), record);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = MemoryStore::new();
        store.put(&Record::new("1", "first", 2000)).await.unwrap();
        // Older timestamp still wins: ordering is by write, not by updated_at.
        store.put(&Record::new("1", "second", 1000)).await.unwrap();

        let record = store.get("1").await.unwrap();
        assert_eq!(record.content, "second");
        assert_eq!(record.updated_at, 1000);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_empty_state_digest() {
        let store = MemoryStore::new();
        assert_eq!(store.state_digest().await.unwrap().to_hex(), EMPTY_DIGEST_HEX);
    }

    #[tokio::test]
    async fn test_tombstone_is_retained() {
        let store = MemoryStore::new();
        let record = Record::new("1", "hello", 1000);
        store.put(&record).await.unwrap();
        let live = store.state_digest().await.unwrap();

        store.put(&record.tombstone(1001)).await.unwrap();

        assert!(store.get("1").await.unwrap().is_deleted);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_ne!(store.state_digest().await.unwrap(), live);
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .put(&Record::new(format!("id-{i}"), "x", i))
                    .await
                    .unwrap();
                store.list_all().await.unwrap().len()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 16);
    }

    proptest::proptest! {
        #[test]
        fn prop_last_put_is_retained(contents in proptest::collection::vec("[a-z]{0,8}", 1..8)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = MemoryStore::new();
            let got = rt.block_on(async {
                for (i, content) in contents.iter().enumerate() {
                    store.put(&Record::new("k", content.as_str(), i as i64)).await.unwrap();
                }
                store.get("k").await.unwrap()
            });
            proptest::prop_assert_eq!(&got.content, contents.last().unwrap());
            proptest::prop_assert_eq!(rt.block_on(store.count()).unwrap(), 1);
        }
    }
}
