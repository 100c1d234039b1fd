//! Batch persistence store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::batch::BatchState;
use crate::error::BatchError;

/// Batch store trait for persistence.
///
/// `save` is a whole-record overwrite. It returns only once the record is
/// durable, so callers may proceed as soon as it resolves.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Save a batch, replacing any previous record with the same id.
    async fn save(&self, batch: &BatchState) -> Result<(), BatchError>;

    /// Load a batch by id.
    async fn load(&self, id: &str) -> Result<Option<BatchState>, BatchError>;

    /// Load every batch that is pending or processing, oldest first.
    async fn list_active(&self) -> Result<Vec<BatchState>, BatchError>;

    /// Load every batch, oldest first.
    async fn list(&self) -> Result<Vec<BatchState>, BatchError>;

    /// Delete a batch. Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<(), BatchError>;
}

fn oldest_first(mut batches: Vec<BatchState>) -> Vec<BatchState> {
    batches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    batches
}

/// In-memory batch store for testing.
pub struct MemoryBatchStore {
    batches: RwLock<HashMap<String, BatchState>>,
}

impl MemoryBatchStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            batches: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBatchStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchStore for MemoryBatchStore {
    async fn save(&self, batch: &BatchState) -> Result<(), BatchError> {
        let mut batches = self.batches.write().await;
        batches.insert(batch.id.clone(), batch.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<BatchState>, BatchError> {
        let batches = self.batches.read().await;
        Ok(batches.get(id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<BatchState>, BatchError> {
        let batches = self.batches.read().await;
        Ok(oldest_first(
            batches
                .values()
                .filter(|b| b.status.is_active())
                .cloned()
                .collect(),
        ))
    }

    async fn list(&self) -> Result<Vec<BatchState>, BatchError> {
        let batches = self.batches.read().await;
        Ok(oldest_first(batches.values().cloned().collect()))
    }

    async fn delete(&self, id: &str) -> Result<(), BatchError> {
        let mut batches = self.batches.write().await;
        batches.remove(id);
        Ok(())
    }
}

/// File system based batch store.
///
/// One JSON document per batch:
/// ```text
/// {storage_path}/
/// ├── {encoded id}.json
/// └── {encoded id}.json.tmp   (only while a write is in progress)
/// ```
pub struct FileBatchStore {
    storage_path: PathBuf,
}

impl FileBatchStore {
    /// Create a new file-based batch store, creating the directory if needed.
    pub async fn new(storage_path: impl Into<PathBuf>) -> Result<Self, BatchError> {
        let storage_path = storage_path.into();
        fs::create_dir_all(&storage_path).await.map_err(|e| {
            BatchError::Persistence(format!(
                "Failed to create store directory {:?}: {}",
                storage_path, e
            ))
        })?;

        debug!("FileBatchStore initialized at {:?}", storage_path);

        Ok(Self { storage_path })
    }

    /// Storage directory.
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    fn batch_path(&self, id: &str) -> PathBuf {
        self.storage_path.join(format!("{}.json", encode_id(id)))
    }

    async fn read_batch(path: &Path) -> Result<Option<BatchState>, BatchError> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BatchError::Persistence(format!(
                    "Failed to read {:?}: {}",
                    path, e
                )));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            BatchError::Persistence(format!("Failed to parse {:?}: {}", path, e))
        })
    }

    async fn read_all(&self) -> Result<Vec<BatchState>, BatchError> {
        let mut entries = fs::read_dir(&self.storage_path).await.map_err(|e| {
            BatchError::Persistence(format!("Failed to read store directory: {}", e))
        })?;

        let mut batches = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_batch(&path).await {
                Ok(Some(batch)) => batches.push(batch),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable batch file: {}", e),
            }
        }
        Ok(batches)
    }
}

/// Encode an id into a file stem. Characters outside `[A-Za-z0-9_-]` become
/// `%XX` so distinct ids never share a file.
fn encode_id(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[async_trait]
impl BatchStore for FileBatchStore {
    async fn save(&self, batch: &BatchState) -> Result<(), BatchError> {
        let path = self.batch_path(&batch.id);
        let tmp_path = path.with_extension("json.tmp");

        let content = serde_json::to_vec_pretty(batch).map_err(|e| {
            BatchError::Persistence(format!("Failed to serialize batch: {}", e))
        })?;

        let write_err =
            |e: std::io::Error| BatchError::Persistence(format!("Failed to write {:?}: {}", tmp_path, e));
        let mut file = fs::File::create(&tmp_path).await.map_err(write_err)?;
        file.write_all(&content).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        fs::rename(&tmp_path, &path).await.map_err(|e| {
            BatchError::Persistence(format!("Failed to replace {:?}: {}", path, e))
        })?;

        debug!("Saved batch '{}' to {:?}", batch.id, path);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<BatchState>, BatchError> {
        Self::read_batch(&self.batch_path(id)).await
    }

    async fn list_active(&self) -> Result<Vec<BatchState>, BatchError> {
        let batches = self.read_all().await?;
        Ok(oldest_first(
            batches.into_iter().filter(|b| b.status.is_active()).collect(),
        ))
    }

    async fn list(&self) -> Result<Vec<BatchState>, BatchError> {
        Ok(oldest_first(self.read_all().await?))
    }

    async fn delete(&self, id: &str) -> Result<(), BatchError> {
        match fs::remove_file(self.batch_path(id)).await {
            Ok(()) => {
                debug!("Deleted batch '{}'", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BatchError::Persistence(format!(
                "Failed to delete batch {}: {}",
                id, e
            ))),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
