//! SQLite implementation of the Store trait.
//!
//! The embedded single-file backend. Uses rusqlite with bundled SQLite,
//! wrapped in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use hashsync_core::Record;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::Store;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations run on the blocking pool.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get("id")?,
        content: row.get("content")?,
        is_deleted: row.get::<_, i64>("is_deleted")? != 0,
        updated_at: row.get("updated_at")?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn put(&self, record: &Record) -> Result<()> {
        let record = record.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO records (id, content, is_deleted, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    content = excluded.content,
                    is_deleted = excluded.is_deleted,
                    updated_at = excluded.updated_at",
                params![
                    record.id,
                    record.content,
                    record.is_deleted as i64,
                    record.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Record> {
        let id = id.to_string();

        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT id, content, is_deleted, updated_at FROM records WHERE id = ?1",
                    params![&id],
                    row_to_record,
                )
                .optional()?;
            found.ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, content, is_deleted, updated_at FROM records")?;
            let records = stmt
                .query_map([], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            usize::try_from(count).map_err(|_| StoreError::InvalidData(format!("count {count}")))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = SqliteStore::open_memory().unwrap();
        let record = Record::new("1", "hello", 1000);

        store.put(&record).await.unwrap();

        assert_eq!(store.get("1").await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = SqliteStore::open_memory().unwrap();
        store.put(&Record::new("1", "first", 1000)).await.unwrap();
        store.put(&Record::new("1", "second", 1000)).await.unwrap();

        assert_eq!(store.get("1").await.unwrap().content, "second");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.get("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_tombstone_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let dead = Record::new("1", "hello", 1000).tombstone(2000);

        store.put(&dead).await.unwrap();

        let back = store.get("1").await.unwrap();
        assert!(back.is_deleted);
        assert_eq!(back.updated_at, 2000);
    }

    #[tokio::test]
    async fn test_digest_matches_memory_backend() {
        let sqlite = SqliteStore::open_memory().unwrap();
        let memory = MemoryStore::new();

        let records = [
            Record::new("b", "two", 2),
            Record::new("a", "one", 1),
            Record::new("c", "three", 3).tombstone(4),
        ];
        for record in &records {
            sqlite.put(record).await.unwrap();
            memory.put(record).await.unwrap();
        }

        assert_eq!(
            sqlite.state_digest().await.unwrap(),
            memory.state_digest().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");

        let digest = {
            let store = SqliteStore::open(&path).unwrap();
            store.put(&Record::new("1", "hello", 1000)).await.unwrap();
            store.state_digest().await.unwrap()
        };

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.state_digest().await.unwrap(), digest);
        assert_eq!(reopened.get("1").await.unwrap().content, "hello");
    }
}
