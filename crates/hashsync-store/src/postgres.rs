//! Postgres implementation of the Store trait.
//!
//! The networked relational backend, built on an sqlx connection pool.
//! Concurrency control is delegated to Postgres itself.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use hashsync_core::Record;

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// Postgres-based store implementation.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to Postgres and ensure the schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool. The caller is responsible for [`migrate`](Self::migrate).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the records table if it does not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                updated_at BIGINT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }
}

fn row_to_record(row: &PgRow) -> std::result::Result<Record, sqlx::Error> {
    Ok(Record {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        is_deleted: row.try_get("is_deleted")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn put(&self, record: &Record) -> Result<()> {
        sqlx::query(
            "INSERT INTO records (id, content, is_deleted, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(&record.id)
        .bind(&record.content)
        .bind(record.is_deleted)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Record> {
        let row = sqlx::query(
            "SELECT id, content, is_deleted, updated_at FROM records WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row_to_record(&row)?),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        let rows = sqlx::query("SELECT id, content, is_deleted, updated_at FROM records")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row_to_record(row).map_err(StoreError::from))
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await?;
        usize::try_from(count).map_err(|_| StoreError::InvalidData(format!("count {count}")))
    }
}
