//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use hashsync_core::Record;
use hashsync_store::{MemoryStore, SqliteStore, Store};
use hashsync_sync::{ReconcileConfig, Reconciler};
use tempfile::TempDir;

/// The record from the single-record sync scenario.
pub fn hello_record() -> Record {
    Record::new("1", "hello", 1000)
}

/// Two records, the second one tombstoned.
pub fn sample_records() -> Vec<Record> {
    vec![
        hello_record(),
        Record {
            id: "2".into(),
            content: "world".into(),
            is_deleted: true,
            updated_at: 2000,
        },
    ]
}

/// Store backends available without external services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    /// SQLite file in a temporary directory.
    Sqlite,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Memory, Backend::Sqlite];
}

/// One party: a store and, for on-disk backends, the directory that holds it.
pub struct TestFixture {
    pub store: Arc<dyn Store>,
    _dir: Option<TempDir>,
}

impl TestFixture {
    /// Empty in-memory party.
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// In-memory party holding `records`.
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            store: Arc::new(MemoryStore::with_records(records)),
            _dir: None,
        }
    }

    /// Party on the given backend, seeded through `put`.
    pub async fn seeded(backend: Backend, records: Vec<Record>) -> Self {
        let fixture = match backend {
            Backend::Memory => Self::new(),
            Backend::Sqlite => {
                let dir = tempfile::tempdir().expect("create temp dir");
                let store = SqliteStore::open(dir.path().join("records.db")).expect("open sqlite");
                Self {
                    store: Arc::new(store),
                    _dir: Some(dir),
                }
            }
        };
        for record in &records {
            fixture.store.put(record).await.expect("seed record");
        }
        fixture
    }

    /// A reconciler over this party's store.
    pub fn reconciler(&self) -> Reconciler<dyn Store> {
        Reconciler::new(Arc::clone(&self.store), ReconcileConfig::default())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create in-memory parties, the i-th holding one record with id `p{i}`.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            TestFixture::with_records(vec![Record::new(
                format!("p{i}"),
                format!("party {i}"),
                i as i64,
            )])
        })
        .collect()
}
