//! Record persistence.
//!
//! The [`RecordStore`] trait is the boundary to whatever database holds
//! file records. skiff only requires insert, partial update, remove and
//! find-by-id, with single-record updates applied atomically. The
//! in-memory implementation backs tests and single-process deployments.

use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use skiff_core::record::{new_record_id, FileRecord, FileRecordUpdate};

/// Persistence of file records, keyed by opaque id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record. When `record.id` is empty a fresh id is
    /// assigned; the stored id is returned either way.
    async fn insert(&self, record: FileRecord) -> Result<String, StoreError>;

    /// Apply a partial field update to one record atomically.
    async fn update(&self, file_id: &str, update: FileRecordUpdate) -> Result<(), StoreError>;

    /// Remove a record by id.
    async fn remove(&self, file_id: &str) -> Result<(), StoreError>;

    /// Fetch a record snapshot by id.
    async fn find(&self, file_id: &str) -> Option<FileRecord>;

    /// Snapshot of every record in the collection.
    async fn all(&self) -> Vec<FileRecord>;
}

/// In-memory record collection.
///
/// Partial updates run under the entry lock of the backing map, which
/// gives the single-record atomicity the pipeline relies on.
#[derive(Default)]
pub struct MemoryCollection {
    records: DashMap<String, FileRecord>,
}

impl MemoryCollection {
    /// Empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryCollection {
    async fn insert(&self, mut record: FileRecord) -> Result<String, StoreError> {
        if record.id.is_empty() {
            record.id = new_record_id();
        }
        let id = record.id.clone();
        self.records.insert(id.clone(), record);
        Ok(id)
    }

    async fn update(&self, file_id: &str, update: FileRecordUpdate) -> Result<(), StoreError> {
        match self.records.get_mut(file_id) {
            Some(mut entry) => {
                update.apply(entry.value_mut());
                Ok(())
            }
            None => Err(StoreError::NotFound(file_id.to_string())),
        }
    }

    async fn remove(&self, file_id: &str) -> Result<(), StoreError> {
        self.records
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))
    }

    async fn find(&self, file_id: &str) -> Option<FileRecord> {
        self.records.get(file_id).map(|entry| entry.value().clone())
    }

    async fn all(&self) -> Vec<FileRecord> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_assigns_id() {
        let collection = MemoryCollection::new();
        let id = collection.insert(FileRecord::new("a.txt")).await.unwrap();
        assert_eq!(id.len(), 32);
        assert_eq!(collection.find(&id).await.unwrap().name, "a.txt");
    }

    #[tokio::test]
    async fn insert_keeps_existing_id() {
        let collection = MemoryCollection::new();
        let mut record = FileRecord::new("a.txt");
        record.id = "fixed".into();
        let id = collection.insert(record).await.unwrap();
        assert_eq!(id, "fixed");
    }

    #[tokio::test]
    async fn partial_update_and_remove() {
        let collection = MemoryCollection::new();
        let id = collection.insert(FileRecord::new("a.txt")).await.unwrap();

        collection
            .update(&id, FileRecordUpdate::uploading(false))
            .await
            .unwrap();
        let record = collection.find(&id).await.unwrap();
        assert!(!record.uploading);
        assert_eq!(record.name, "a.txt");

        collection.remove(&id).await.unwrap();
        assert!(collection.find(&id).await.is_none());
        assert!(matches!(
            collection.remove(&id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let collection = MemoryCollection::new();
        let result = collection
            .update("missing", FileRecordUpdate::uploading(true))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
