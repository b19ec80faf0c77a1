//! In-process upload transport.
//!
//! [`LocalTransport`] binds the client-side [`UploadTransport`] seam
//! directly to a store registry in the same process: chunks accumulate
//! in a per-file pending buffer (the protocol guarantees strict offset
//! order, so appending suffices) and `complete` streams the buffer
//! through the owning store's write pipeline.

use crate::error::StoreError;
use crate::store::Store;
use async_trait::async_trait;
use dashmap::DashMap;
use skiff_core::error::ErrorCode;
use skiff_core::record::{FileRecord, FileRecordUpdate};
use skiff_core::transport::{TransportError, UploadTransport};
use skiff_core::StoreRegistry;
use std::io::Cursor;
use std::sync::Arc;

/// Loopback transport over a registry of in-process stores.
pub struct LocalTransport {
    registry: Arc<StoreRegistry<Store>>,
    pending: DashMap<String, Vec<u8>>,
}

impl LocalTransport {
    /// Transport resolving store names against `registry`.
    #[must_use]
    pub fn new(registry: Arc<StoreRegistry<Store>>) -> Self {
        Self {
            registry,
            pending: DashMap::new(),
        }
    }

    fn store(&self, name: &str) -> Result<Arc<Store>, TransportError> {
        self.registry
            .get(name)
            .ok_or_else(|| map_err(StoreError::UnknownStore(name.to_string())))
    }

    /// Bytes currently buffered for a file, if any.
    #[must_use]
    pub fn pending_bytes(&self, file_id: &str) -> Option<usize> {
        self.pending.get(file_id).map(|entry| entry.value().len())
    }
}

fn map_err(err: StoreError) -> TransportError {
    TransportError::new(err.code(), err.to_string())
}

#[async_trait]
impl UploadTransport for LocalTransport {
    async fn create(&self, record: FileRecord) -> Result<String, TransportError> {
        let store = self.store(&record.store)?;
        store.create(record).await.map_err(map_err)
    }

    async fn write_chunk(
        &self,
        chunk: &[u8],
        file_id: &str,
        store: &str,
        progress: f64,
    ) -> Result<usize, TransportError> {
        let store = self.store(store)?;
        if store.find(file_id).await.is_none() {
            return Err(TransportError::not_found(file_id));
        }
        self.pending
            .entry(file_id.to_string())
            .or_default()
            .extend_from_slice(chunk);
        store
            .collection()
            .update(
                file_id,
                FileRecordUpdate {
                    progress: Some(progress),
                    ..FileRecordUpdate::default()
                },
            )
            .await
            .map_err(map_err)?;
        Ok(chunk.len())
    }

    async fn complete(&self, file_id: &str, store: &str) -> Result<FileRecord, TransportError> {
        let store = self.store(store)?;
        let buffered = self
            .pending
            .remove(file_id)
            .map(|(_, bytes)| bytes)
            .unwrap_or_default();
        store
            .write(Box::new(Cursor::new(buffered)), file_id)
            .await
            .map_err(map_err)
    }

    async fn set_uploading(
        &self,
        file_id: &str,
        store: &str,
        uploading: bool,
    ) -> Result<(), TransportError> {
        let store = self.store(store)?;
        store
            .collection()
            .update(file_id, FileRecordUpdate::uploading(uploading))
            .await
            .map_err(map_err)
    }

    async fn remove(&self, file_id: &str, store: &str) -> Result<(), TransportError> {
        let store = self.store(store)?;
        self.pending.remove(file_id);
        store.remove(file_id).await.map_err(map_err)
    }
}
