//! SQLite batch store.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::params;
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use crate::batch::BatchState;
use crate::error::BatchError;
use crate::store::BatchStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS batches (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    record TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_batches_status ON batches(status);
"#;

/// SQLite-backed batch store. One row per batch holding the serialized
/// record, with the status duplicated into its own column for filtering.
pub struct SqliteBatchStore {
    conn: Connection,
}

impl SqliteBatchStore {
    /// Open (or create) a database file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, BatchError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BatchError::Persistence(format!("Failed to create {:?}: {}", parent, e))
            })?;
        }

        let conn = Connection::open(&path)
            .await
            .map_err(|e| BatchError::Persistence(e.to_string()))?;
        Self::init(conn).await
    }

    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, BatchError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| BatchError::Persistence(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, BatchError> {
        conn.call(|conn| Ok(conn.execute_batch(SCHEMA)?))
            .await
            .map_err(|e| BatchError::Persistence(e.to_string()))?;
        debug!("SqliteBatchStore initialized");
        Ok(Self { conn })
    }

    async fn query_records(&self, active_only: bool) -> Result<Vec<BatchState>, BatchError> {
        let rows: Vec<(String, String)> = self
            .conn
            .call(move |conn| {
                let sql = if active_only {
                    "SELECT id, record FROM batches WHERE status IN ('pending', 'processing')
                     ORDER BY created_at, id"
                } else {
                    "SELECT id, record FROM batches ORDER BY created_at, id"
                };
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| BatchError::Persistence(e.to_string()))?;

        let mut batches = Vec::with_capacity(rows.len());
        for (id, record) in rows {
            match serde_json::from_str(&record) {
                Ok(batch) => batches.push(batch),
                Err(e) => warn!("Skipping unreadable batch row '{}': {}", id, e),
            }
        }
        Ok(batches)
    }
}

#[async_trait]
impl BatchStore for SqliteBatchStore {
    async fn save(&self, batch: &BatchState) -> Result<(), BatchError> {
        let record = serde_json::to_string(batch).map_err(|e| {
            BatchError::Persistence(format!("Failed to serialize batch: {}", e))
        })?;
        let id = batch.id.clone();
        let status = batch.status.as_str();
        let created_at = batch.created_at.to_rfc3339();
        let updated_at = batch.updated_at.to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO batches (id, status, record, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        status = excluded.status,
                        record = excluded.record,
                        created_at = excluded.created_at,
                        updated_at = excluded.updated_at",
                    params![id, status, record, created_at, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| BatchError::Persistence(e.to_string()))?;

        debug!("Saved batch '{}'", batch.id);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<BatchState>, BatchError> {
        let id = id.to_string();
        let record: Option<String> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT record FROM batches WHERE id = ?1")?;
                let mut rows = stmt.query_map([&id], |row| row.get(0))?;
                Ok(rows.next().transpose()?)
            })
            .await
            .map_err(|e| BatchError::Persistence(e.to_string()))?;

        record
            .map(|r| {
                serde_json::from_str(&r).map_err(|e| {
                    BatchError::Persistence(format!("Failed to parse batch record: {}", e))
                })
            })
            .transpose()
    }

    async fn list_active(&self) -> Result<Vec<BatchState>, BatchError> {
        self.query_records(true).await
    }

    async fn list(&self) -> Result<Vec<BatchState>, BatchError> {
        self.query_records(false).await
    }

    async fn delete(&self, id: &str) -> Result<(), BatchError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM batches WHERE id = ?1", [&id])?;
                Ok(())
            })
            .await
            .map_err(|e| BatchError::Persistence(e.to_string()))
    }
}

#[cfg(test)]
#[path = "store_sqlite_tests.rs"]
mod tests;
