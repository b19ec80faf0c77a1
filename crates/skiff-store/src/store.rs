//! Store orchestration: create, write/finalize, copy, remove.
//!
//! A [`Store`] owns one named storage target: a record collection, an
//! ordered set of storage adapters (the first is the primary write
//! target), insertion filters, a byte transform and a list of secondary
//! stores to replicate finished files to.
//!
//! # Write pipeline
//!
//! ```text
//! incoming bytes                     verification
//!      |                                  |
//!      v                                  v
//!  transform.write --> adapter ws --> adapter rs --> finalize update
//!        |                                               |
//!        '-- error: record removed (rollback)            '-- replication
//! ```

use crate::adapter::{ByteReader, StorageAdapter};
use crate::collection::{MemoryCollection, RecordStore};
use crate::error::StoreError;
use crate::transform::{Passthrough, Transform};
use skiff_core::filter::Filter;
use skiff_core::record::{
    derive_url, extension_of, generate_token, FileRecord, FileRecordUpdate, VersionState,
};
use skiff_core::StoreRegistry;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Hook invoked with the finalized record after a successful upload.
pub type FinishHook = Box<dyn Fn(&FileRecord) + Send + Sync>;

/// Hook invoked with a stream error, the file id and the record, on the
/// write or verification-read error paths.
pub type StreamErrorHook = Box<dyn Fn(&io::Error, &str, &FileRecord) + Send + Sync>;

/// Hook invoked when replicating a file to a secondary store fails.
pub type CopyErrorHook = Box<dyn Fn(&StoreError, &str, &FileRecord) + Send + Sync>;

/// Result of a successful copy to a secondary store.
#[derive(Debug, Clone)]
pub struct CopyOutcome {
    /// Id of the newly created record on the target store.
    pub copy_id: String,
    /// The finalized copy record.
    pub record: FileRecord,
    /// Target store name.
    pub target: String,
}

/// One named storage target and its collaborators.
pub struct Store {
    name: String,
    base_url: Option<String>,
    collection: Arc<dyn RecordStore>,
    storage: Vec<Arc<dyn StorageAdapter>>,
    filters: Vec<Arc<dyn Filter>>,
    transform: Arc<dyn Transform>,
    copy_to: Vec<String>,
    registry: Arc<StoreRegistry<Store>>,
    on_finish_upload: Option<FinishHook>,
    on_write_error: Option<StreamErrorHook>,
    on_read_error: Option<StreamErrorHook>,
    on_copy_error: Option<CopyErrorHook>,
    simulate_write_delay: Option<Duration>,
}

impl Store {
    /// Start building a store with the given name.
    pub fn builder(name: impl Into<String>) -> StoreBuilder {
        StoreBuilder::new(name)
    }

    /// Store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The record collection backing this store.
    #[must_use]
    pub fn collection(&self) -> &Arc<dyn RecordStore> {
        &self.collection
    }

    /// All configured storage adapters, primary first.
    #[must_use]
    pub fn adapters(&self) -> &[Arc<dyn StorageAdapter>] {
        &self.storage
    }

    /// Whether every filter on this store accepts the record. Used as
    /// the replication gate; a store with no filters accepts everything.
    #[must_use]
    pub fn accepts(&self, record: &FileRecord) -> bool {
        self.filters.iter().all(|f| f.accepts(record))
    }

    /// Serving URL for a record, when a base URL is configured.
    #[must_use]
    pub fn file_url(&self, record: &FileRecord) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|base| derive_url(base, &self.name, &record.id, &record.name))
    }

    fn primary(&self) -> &Arc<dyn StorageAdapter> {
        // The builder rejects stores without adapters.
        &self.storage[0]
    }

    /// Insert a record into this store's collection.
    ///
    /// Normalizes the record (owning store, extension, fresh `versions`
    /// map keyed by every configured adapter) and runs all insertion
    /// filters. Fails with [`StoreError::Validation`] on an empty name
    /// or a filter rejection.
    pub async fn create(&self, mut record: FileRecord) -> Result<String, StoreError> {
        if record.name.is_empty() {
            return Err(StoreError::Validation("file name not defined".into()));
        }
        record.store = self.name.clone();
        record.extension = extension_of(&record.name);
        record.versions = self
            .storage
            .iter()
            .map(|adapter| (adapter.name().to_string(), VersionState::default()))
            .collect();
        for filter in &self.filters {
            filter
                .check(&record)
                .map_err(|rejection| StoreError::Validation(rejection.to_string()))?;
        }
        let id = self.collection.insert(record).await?;
        tracing::debug!(store = %self.name, file_id = %id, "record created");
        Ok(id)
    }

    /// Fetch a record snapshot by id.
    pub async fn find(&self, file_id: &str) -> Option<FileRecord> {
        self.collection.find(file_id).await
    }

    /// Stream `reader` into this store and finalize the record.
    ///
    /// On a write-stream error the record is removed (rollback) and the
    /// write-error hook fires; retry is entirely the uploader's concern.
    /// On success the stored bytes are read back to compute the verified
    /// size - the sender's byte count is never trusted - the record is
    /// finalized with a single partial update, and replication to the
    /// configured secondary stores is spawned fire-and-forget.
    pub async fn write(
        self: &Arc<Self>,
        mut reader: ByteReader,
        file_id: &str,
    ) -> Result<FileRecord, StoreError> {
        let mut record = self
            .collection
            .find(file_id)
            .await
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))?;
        let adapter = self.primary();

        self.collection
            .update(
                file_id,
                FileRecordUpdate::version(
                    adapter.name(),
                    VersionState {
                        processing: true,
                        stored: false,
                    },
                ),
            )
            .await?;

        if let Err(err) = self.pipe_to_adapter(&mut reader, &record).await {
            tracing::error!(
                store = %self.name,
                file_id,
                error = %err,
                "write stream failed, rolling back record"
            );
            let _ = self.collection.remove(file_id).await;
            if let Some(hook) = &self.on_write_error {
                hook(&err, file_id, &record);
            }
            return Err(StoreError::Stream(err));
        }

        // Size is recomputed from what was actually persisted.
        let size = match self.read_back_size(file_id).await {
            Ok(size) => size,
            Err(err) => {
                tracing::error!(store = %self.name, file_id, error = %err, "verification read failed");
                if let Some(hook) = &self.on_read_error {
                    hook(&err, file_id, &record);
                }
                return Err(StoreError::Stream(err));
            }
        };

        let stored = VersionState {
            processing: false,
            stored: true,
        };
        self.collection
            .update(file_id, FileRecordUpdate::version(adapter.name(), stored))
            .await?;

        let finalize = FileRecordUpdate::finalize(size, generate_token(), self.file_url(&record));
        self.collection.update(file_id, finalize.clone()).await?;
        finalize.apply(&mut record);
        record.versions.insert(adapter.name().to_string(), stored);

        tracing::info!(store = %self.name, file_id, size, "upload finalized");
        if let Some(hook) = &self.on_finish_upload {
            hook(&record);
        }

        // Rate-limiting simulation, for tests only.
        if let Some(delay) = self.simulate_write_delay {
            tokio::time::sleep(delay).await;
        }

        self.spawn_replication(&record);
        Ok(record)
    }

    async fn pipe_to_adapter(
        &self,
        reader: &mut ByteReader,
        record: &FileRecord,
    ) -> io::Result<()> {
        let mut writer = self.primary().write_stream(&record.id).await?;
        self.transform.write(reader, &mut writer, record).await?;
        writer.shutdown().await
    }

    async fn read_back_size(&self, file_id: &str) -> io::Result<u64> {
        let mut reader = self.primary().read_stream(file_id).await?;
        tokio::io::copy(&mut reader, &mut tokio::io::sink()).await
    }

    /// Copy a finalized file to a target store.
    ///
    /// Creates a fresh record on the target pointing back at the source
    /// via `originalStore`/`originalId`, then streams the source bytes
    /// through the target's write pipeline. A source read error leaves
    /// the empty target record in place for inspection; a target write
    /// failure rolls the copy record back before the copy-error hook
    /// fires. The source record is never touched.
    pub async fn copy(
        self: &Arc<Self>,
        file_id: &str,
        target: &Arc<Store>,
    ) -> Result<CopyOutcome, StoreError> {
        let file = self
            .collection
            .find(file_id)
            .await
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))?;

        let copy_id = target.create(file.replica_for(target.name())).await?;

        let reader = match self.primary().read_stream(file_id).await {
            Ok(reader) => reader,
            Err(err) => {
                tracing::error!(
                    store = %self.name,
                    file_id,
                    target = %target.name,
                    error = %err,
                    "replication source read failed"
                );
                if let Some(hook) = &self.on_read_error {
                    hook(&err, file_id, &file);
                }
                return Err(StoreError::replication(
                    target.name(),
                    StoreError::Stream(err),
                ));
            }
        };

        match target.write(reader, &copy_id).await {
            Ok(record) => Ok(CopyOutcome {
                copy_id,
                record,
                target: target.name.clone(),
            }),
            Err(err) => {
                // Roll the copy back; write() already removed it on the
                // write-error path, so this is a best-effort cleanup for
                // verification failures.
                let _ = target.collection.remove(&copy_id).await;
                let err = StoreError::replication(target.name(), err);
                if let Some(hook) = &self.on_copy_error {
                    hook(&err, file_id, &file);
                }
                Err(err)
            }
        }
    }

    fn spawn_replication(self: &Arc<Self>, record: &FileRecord) {
        for target_name in &self.copy_to {
            let Some(target) = self.registry.get(target_name) else {
                tracing::warn!(
                    store = %self.name,
                    target = %target_name,
                    "replication target not registered"
                );
                continue;
            };
            if !target.accepts(record) {
                tracing::debug!(
                    store = %self.name,
                    target = %target_name,
                    file_id = %record.id,
                    "replication filtered out"
                );
                continue;
            }
            let source = Arc::clone(self);
            let target_name = target_name.clone();
            let file_id = record.id.clone();
            tokio::spawn(async move {
                match source.copy(&file_id, &target).await {
                    Ok(outcome) => tracing::info!(
                        store = %source.name,
                        target = %target_name,
                        copy_id = %outcome.copy_id,
                        "replicated file"
                    ),
                    Err(err) => tracing::error!(
                        store = %source.name,
                        target = %target_name,
                        file_id = %file_id,
                        error = %err,
                        "replication failed"
                    ),
                }
            });
        }
    }

    /// Remove a record and its physical bytes.
    ///
    /// Deletes the bytes from every storage target whose version state
    /// says they are stored or still mid-write (a failed verification
    /// read leaves committed bytes behind a `processing` flag), then
    /// removes the record itself.
    pub async fn remove(&self, file_id: &str) -> Result<(), StoreError> {
        let record = self
            .collection
            .find(file_id)
            .await
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))?;
        for adapter in &self.storage {
            let has_bytes = record
                .versions
                .get(adapter.name())
                .is_some_and(|v| v.stored || v.processing);
            if has_bytes {
                if let Err(err) = adapter.delete(file_id).await {
                    tracing::error!(
                        store = %self.name,
                        file_id,
                        adapter = %adapter.name(),
                        error = %err,
                        "cannot delete stored bytes"
                    );
                }
            }
        }
        self.collection.remove(file_id).await
    }
}

/// Builder for [`Store`]. Registers the finished store in the registry.
pub struct StoreBuilder {
    name: String,
    base_url: Option<String>,
    collection: Option<Arc<dyn RecordStore>>,
    storage: Vec<Arc<dyn StorageAdapter>>,
    filters: Vec<Arc<dyn Filter>>,
    transform: Arc<dyn Transform>,
    copy_to: Vec<String>,
    on_finish_upload: Option<FinishHook>,
    on_write_error: Option<StreamErrorHook>,
    on_read_error: Option<StreamErrorHook>,
    on_copy_error: Option<CopyErrorHook>,
    simulate_write_delay: Option<Duration>,
}

impl StoreBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: None,
            collection: None,
            storage: Vec::new(),
            filters: Vec::new(),
            transform: Arc::new(Passthrough),
            copy_to: Vec::new(),
            on_finish_upload: None,
            on_write_error: None,
            on_read_error: None,
            on_copy_error: None,
            simulate_write_delay: None,
        }
    }

    /// Use the given record collection. Defaults to a fresh
    /// [`MemoryCollection`].
    #[must_use]
    pub fn collection(mut self, collection: impl RecordStore + 'static) -> Self {
        self.collection = Some(Arc::new(collection));
        self
    }

    /// Add a storage adapter. The first one added is the primary write
    /// target; at least one is required.
    #[must_use]
    pub fn adapter(mut self, adapter: impl StorageAdapter + 'static) -> Self {
        self.storage.push(Arc::new(adapter));
        self
    }

    /// Add an insertion/replication filter.
    #[must_use]
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Use a byte transform other than passthrough.
    #[must_use]
    pub fn transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Arc::new(transform);
        self
    }

    /// Replicate finished files to the named store.
    #[must_use]
    pub fn copy_to(mut self, target: impl Into<String>) -> Self {
        self.copy_to.push(target.into());
        self
    }

    /// Base URL for derived serving URLs.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sleep after each finalize. Rate-limiting simulation for tests.
    #[must_use]
    pub fn simulate_write_delay(mut self, delay: Duration) -> Self {
        self.simulate_write_delay = Some(delay);
        self
    }

    /// Hook invoked with each finalized record.
    #[must_use]
    pub fn on_finish_upload(mut self, hook: impl Fn(&FileRecord) + Send + Sync + 'static) -> Self {
        self.on_finish_upload = Some(Box::new(hook));
        self
    }

    /// Hook invoked on write-stream failures, after rollback.
    #[must_use]
    pub fn on_write_error(
        mut self,
        hook: impl Fn(&io::Error, &str, &FileRecord) + Send + Sync + 'static,
    ) -> Self {
        self.on_write_error = Some(Box::new(hook));
        self
    }

    /// Hook invoked on read-stream failures.
    #[must_use]
    pub fn on_read_error(
        mut self,
        hook: impl Fn(&io::Error, &str, &FileRecord) + Send + Sync + 'static,
    ) -> Self {
        self.on_read_error = Some(Box::new(hook));
        self
    }

    /// Hook invoked when a copy to a secondary store fails.
    #[must_use]
    pub fn on_copy_error(
        mut self,
        hook: impl Fn(&StoreError, &str, &FileRecord) + Send + Sync + 'static,
    ) -> Self {
        self.on_copy_error = Some(Box::new(hook));
        self
    }

    /// Finish the store and register it.
    ///
    /// Fails with [`StoreError::Validation`] when the name is empty or
    /// no storage adapter was configured.
    pub fn build(self, registry: &Arc<StoreRegistry<Store>>) -> Result<Arc<Store>, StoreError> {
        if self.name.is_empty() {
            return Err(StoreError::Validation("store name not defined".into()));
        }
        if self.storage.is_empty() {
            return Err(StoreError::Validation(format!(
                "store {} has no storage adapter",
                self.name
            )));
        }
        let store = Arc::new(Store {
            name: self.name,
            base_url: self.base_url,
            collection: self
                .collection
                .unwrap_or_else(|| Arc::new(MemoryCollection::new())),
            storage: self.storage,
            filters: self.filters,
            transform: self.transform,
            copy_to: self.copy_to,
            registry: Arc::clone(registry),
            on_finish_upload: self.on_finish_upload,
            on_write_error: self.on_write_error,
            on_read_error: self.on_read_error,
            on_copy_error: self.on_copy_error,
            simulate_write_delay: self.simulate_write_delay,
        });
        registry.register(store.name.clone(), Arc::clone(&store));
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAdapter;
    use async_trait::async_trait;
    use crate::adapter::ByteWriter;
    use skiff_core::FileFilter;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> Arc<StoreRegistry<Store>> {
        Arc::new(StoreRegistry::new())
    }

    fn reader(bytes: &[u8]) -> ByteReader {
        Box::new(Cursor::new(bytes.to_vec()))
    }

    /// Adapter whose write streams always fail.
    struct BrokenAdapter;

    #[async_trait]
    impl StorageAdapter for BrokenAdapter {
        fn name(&self) -> &str {
            "broken"
        }
        async fn read_stream(&self, _file_id: &str) -> io::Result<ByteReader> {
            Err(io::Error::other("read refused"))
        }
        async fn write_stream(&self, _file_id: &str) -> io::Result<ByteWriter> {
            Err(io::Error::other("write refused"))
        }
        async fn delete(&self, _file_id: &str) -> io::Result<()> {
            Ok(())
        }
    }

    /// Adapter that commits writes but refuses the read-back.
    struct WriteOnlyAdapter {
        inner: MemoryAdapter,
    }

    #[async_trait]
    impl StorageAdapter for WriteOnlyAdapter {
        fn name(&self) -> &str {
            self.inner.name()
        }
        async fn read_stream(&self, _file_id: &str) -> io::Result<ByteReader> {
            Err(io::Error::other("read refused"))
        }
        async fn write_stream(&self, file_id: &str) -> io::Result<ByteWriter> {
            self.inner.write_stream(file_id).await
        }
        async fn delete(&self, file_id: &str) -> io::Result<()> {
            self.inner.delete(file_id).await
        }
    }

    #[tokio::test]
    async fn create_normalizes_and_initializes_versions() {
        let registry = registry();
        let store = Store::builder("primary")
            .adapter(MemoryAdapter::new("mem-a"))
            .adapter(MemoryAdapter::new("mem-b"))
            .build(&registry)
            .unwrap();

        let id = store.create(FileRecord::new("Photo.PNG")).await.unwrap();
        let record = store.find(&id).await.unwrap();
        assert_eq!(record.store, "primary");
        assert_eq!(record.extension, "png");
        assert_eq!(record.versions.len(), 2);
        assert!(!record.versions["mem-a"].stored);
        assert!(!record.versions["mem-b"].stored);
    }

    #[tokio::test]
    async fn create_rejects_empty_name_and_filtered_records() {
        let registry = registry();
        let store = Store::builder("primary")
            .adapter(MemoryAdapter::new("mem"))
            .filter(FileFilter::new().extensions(["png"]))
            .build(&registry)
            .unwrap();

        let err = store.create(FileRecord::new("")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = store.create(FileRecord::new("doc.pdf")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn builder_requires_an_adapter() {
        let registry = registry();
        let result = Store::builder("empty").build(&registry);
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(registry.get("empty").is_none());
    }

    #[tokio::test]
    async fn write_finalizes_with_verified_size() {
        let registry = registry();
        let adapter = MemoryAdapter::new("mem");
        let blobs = adapter.clone();
        let store = Store::builder("primary")
            .adapter(adapter)
            .base_url("http://localhost/files")
            .build(&registry)
            .unwrap();

        let id = store.create(FileRecord::new("data.bin")).await.unwrap();
        let record = store.write(reader(b"hello world"), &id).await.unwrap();

        assert!(record.complete);
        assert!(!record.uploading);
        assert_eq!(record.progress, 1.0);
        assert_eq!(record.size, 11);
        assert!(record.token.is_some());
        assert!(record.uploaded_at.is_some());
        assert_eq!(
            record.url.as_deref(),
            Some(format!("http://localhost/files/primary/{id}/data.bin").as_str())
        );
        assert!(record.versions["mem"].stored);
        assert_eq!(blobs.bytes(&id).unwrap(), b"hello world");

        // The persisted record matches the returned snapshot.
        let persisted = store.find(&id).await.unwrap();
        assert!(persisted.complete);
        assert_eq!(persisted.size, 11);
        assert!(persisted.versions["mem"].stored);
    }

    #[tokio::test]
    async fn write_unknown_id_is_not_found() {
        let registry = registry();
        let store = Store::builder("primary")
            .adapter(MemoryAdapter::new("mem"))
            .build(&registry)
            .unwrap();
        let err = store.write(reader(b"x"), "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn write_failure_rolls_back_record() {
        let registry = registry();
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&hook_calls);
        let store = Store::builder("primary")
            .adapter(BrokenAdapter)
            .on_write_error(move |_err, _id, _record| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .build(&registry)
            .unwrap();

        let id = store.create(FileRecord::new("data.bin")).await.unwrap();
        let err = store.write(reader(b"payload"), &id).await.unwrap_err();

        assert!(matches!(err, StoreError::Stream(_)));
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
        // The partial record is not left behind.
        assert!(store.find(&id).await.is_none());
    }

    #[tokio::test]
    async fn remove_deletes_stored_bytes() {
        let registry = registry();
        let adapter = MemoryAdapter::new("mem");
        let blobs = adapter.clone();
        let store = Store::builder("primary")
            .adapter(adapter)
            .build(&registry)
            .unwrap();

        let id = store.create(FileRecord::new("data.bin")).await.unwrap();
        store.write(reader(b"bytes"), &id).await.unwrap();
        assert!(blobs.contains(&id));

        store.remove(&id).await.unwrap();
        assert!(!blobs.contains(&id));
        assert!(store.find(&id).await.is_none());
    }

    #[tokio::test]
    async fn remove_after_failed_verification_deletes_committed_bytes() {
        let registry = registry();
        let adapter = WriteOnlyAdapter {
            inner: MemoryAdapter::new("mem"),
        };
        let blobs = adapter.inner.clone();
        let store = Store::builder("primary")
            .adapter(adapter)
            .build(&registry)
            .unwrap();

        let id = store.create(FileRecord::new("data.bin")).await.unwrap();
        let err = store.write(reader(b"committed bytes"), &id).await.unwrap_err();
        assert!(matches!(err, StoreError::Stream(_)));
        // The record survives a verification failure, and the bytes landed.
        let record = store.find(&id).await.unwrap();
        assert!(record.versions["mem"].processing);
        assert!(blobs.contains(&id));

        store.remove(&id).await.unwrap();
        assert!(store.find(&id).await.is_none());
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn remove_incomplete_upload_skips_physical_delete() {
        let registry = registry();
        let adapter = MemoryAdapter::new("mem");
        let blobs = adapter.clone();
        let store = Store::builder("primary")
            .adapter(adapter)
            .build(&registry)
            .unwrap();

        let id = store.create(FileRecord::new("data.bin")).await.unwrap();
        store.remove(&id).await.unwrap();
        assert!(store.find(&id).await.is_none());
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn direct_copy_creates_lineage_record() {
        let registry = registry();
        let source_adapter = MemoryAdapter::new("src-mem");
        let target_adapter = MemoryAdapter::new("dst-mem");
        let target_blobs = target_adapter.clone();
        let source = Store::builder("primary")
            .adapter(source_adapter)
            .build(&registry)
            .unwrap();
        let target = Store::builder("backup")
            .adapter(target_adapter)
            .build(&registry)
            .unwrap();

        let id = source.create(FileRecord::new("data.bin")).await.unwrap();
        source.write(reader(b"replicate me"), &id).await.unwrap();

        let outcome = source.copy(&id, &target).await.unwrap();
        assert_eq!(outcome.target, "backup");
        assert_eq!(outcome.record.original_store.as_deref(), Some("primary"));
        assert_eq!(outcome.record.original_id.as_deref(), Some(id.as_str()));
        assert!(outcome.record.complete);
        assert_eq!(outcome.record.size, 12);
        assert_eq!(target_blobs.bytes(&outcome.copy_id).unwrap(), b"replicate me");

        // Source record untouched by the copy.
        let original = source.find(&id).await.unwrap();
        assert!(original.complete);
        assert!(original.original_store.is_none());
    }

    #[tokio::test]
    async fn copy_rollback_on_target_write_failure() {
        let registry = registry();
        let copy_errors = Arc::new(AtomicUsize::new(0));
        let errors = Arc::clone(&copy_errors);
        let source = Store::builder("primary")
            .adapter(MemoryAdapter::new("src-mem"))
            .on_copy_error(move |_err, _id, _file| {
                errors.fetch_add(1, Ordering::SeqCst);
            })
            .build(&registry)
            .unwrap();
        let target = Store::builder("backup")
            .adapter(BrokenAdapter)
            .build(&registry)
            .unwrap();

        let id = source.create(FileRecord::new("data.bin")).await.unwrap();
        source.write(reader(b"bytes"), &id).await.unwrap();

        let err = source.copy(&id, &target).await.unwrap_err();
        assert!(matches!(err, StoreError::Replication { .. }));
        assert_eq!(copy_errors.load(Ordering::SeqCst), 1);
        // The copy record was rolled back; the primary is intact.
        assert!(target.collection().all().await.is_empty());
        assert!(source.find(&id).await.unwrap().complete);
    }
}
