//! JSON-file record catalog.
//!
//! Persists a store's records to a single JSON file so uploads survive
//! process restarts - which is what makes stop/resume useful from a
//! CLI. Every mutation rewrites the file through a temporary sibling
//! and rename, so a crash never leaves a torn catalog.

use async_trait::async_trait;
use skiff_core::record::{new_record_id, FileRecord, FileRecordUpdate};
use skiff_store::{RecordStore, StoreError};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File-backed record collection.
pub struct JsonCatalog {
    path: PathBuf,
    records: Mutex<BTreeMap<String, FileRecord>>,
}

impl JsonCatalog {
    /// Open a catalog, loading existing records when the file exists.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text).map_err(io::Error::other)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    async fn persist(&self, records: &BTreeMap<String, FileRecord>) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(records)
            .map_err(|err| StoreError::Stream(io::Error::other(err)))?;
        let tmp = self.path.with_extension("json.part");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonCatalog {
    async fn insert(&self, mut record: FileRecord) -> Result<String, StoreError> {
        if record.id.is_empty() {
            record.id = new_record_id();
        }
        let id = record.id.clone();
        let mut records = self.records.lock().await;
        records.insert(id.clone(), record);
        self.persist(&records).await?;
        Ok(id)
    }

    async fn update(&self, file_id: &str, update: FileRecordUpdate) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(file_id)
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))?;
        update.apply(record);
        self.persist(&records).await
    }

    async fn remove(&self, file_id: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if records.remove(file_id).is_none() {
            return Err(StoreError::NotFound(file_id.to_string()));
        }
        self.persist(&records).await
    }

    async fn find(&self, file_id: &str) -> Option<FileRecord> {
        self.records.lock().await.get(file_id).cloned()
    }

    async fn all(&self) -> Vec<FileRecord> {
        self.records.lock().await.values().cloned().collect()
    }
}
