//! Resumable upload session state machine.
//!
//! One [`Uploader`] owns one upload of one in-memory buffer to one
//! named store. Chunks are sent strictly one at a time; chunk `n + 1`
//! is never issued before chunk `n`'s acknowledgment arrives. Transient
//! failures are retried after a fixed one-second delay up to the
//! configured ceiling; 400/404 responses abort immediately.
//!
//! # Session states
//!
//! ```text
//! Idle -> Creating -> Uploading <-> Retrying -> Finalizing -> Complete
//!                         |
//!                         +-> Stopped (resumable via start())
//!                         +-> Aborted (record deleted)
//! ```
//!
//! `stop()` and `abort()` flip shared flags; the upload loop re-checks
//! them after every await point, including the retry sleep. The check
//! is the guard - a timer that fires after an abort finds the session
//! no longer uploading and schedules nothing further.

use crate::chunking::ChunkSizer;
use skiff_core::error::ErrorCode;
use skiff_core::record::FileRecord;
use skiff_core::transport::{TransportError, UploadTransport};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Fixed delay before re-sending a failed chunk.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default initial chunk length (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Errors surfaced by an upload session.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The initial record insert failed.
    #[error("record creation failed: {0}")]
    Create(#[source] TransportError),

    /// Resuming a stopped session failed.
    #[error("resume failed: {0}")]
    Resume(#[source] TransportError),

    /// A chunk write failed permanently - either a non-retryable code
    /// or the retry ceiling was reached. The session was aborted.
    #[error("chunk write failed after {tries} attempts: {source}")]
    Chunk {
        /// Consecutive failures of the chunk.
        tries: u32,
        /// The final transport failure.
        #[source]
        source: TransportError,
    },

    /// The completion call failed. The session was aborted.
    #[error("finalize failed: {0}")]
    Complete(#[source] TransportError),
}

/// Upload session configuration.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Target store name.
    pub store: String,
    /// Enable closed-loop chunk sizing.
    pub adaptive: bool,
    /// Target fraction of one second per chunk transfer, in `(0, 1)`.
    pub capacity: f64,
    /// Initial chunk length in bytes.
    pub chunk_size: usize,
    /// Upper bound for adaptive chunk lengths; `0` means unbounded.
    pub max_chunk_size: usize,
    /// Consecutive-failure ceiling per chunk.
    pub max_tries: u32,
}

impl UploaderConfig {
    /// Defaults for a store: adaptive sizing at 0.9 capacity, 8 KiB
    /// initial chunks, unbounded growth, five tries.
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            adaptive: true,
            capacity: 0.9,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunk_size: 0,
            max_tries: 5,
        }
    }
}

/// Observable session state published on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadState {
    /// A chunk loop currently owns the session.
    pub uploading: bool,
    /// The upload finalized successfully.
    pub complete: bool,
    /// Confirmed fraction in `0.0..=1.0`.
    pub progress: f64,
    /// Bytes confirmed persisted.
    pub loaded: u64,
}

impl UploadState {
    fn idle() -> Self {
        Self {
            uploading: false,
            complete: false,
            progress: 0.0,
            loaded: 0,
        }
    }
}

/// Mutable per-session counters.
struct Session {
    offset: usize,
    loaded: usize,
    tries: u32,
    chunk_len: usize,
}

type RecordHook = Box<dyn Fn(&FileRecord) + Send + Sync>;
type ProgressHook = Box<dyn Fn(&FileRecord, f64) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&UploadError) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_create: Option<RecordHook>,
    on_start: Option<RecordHook>,
    on_progress: Option<ProgressHook>,
    on_complete: Option<RecordHook>,
    on_stop: Option<RecordHook>,
    on_abort: Option<RecordHook>,
    on_error: Option<ErrorHook>,
}

/// Client-side controller for one resumable upload session.
///
/// Exactly one uploader drives a given file id; the session owns the id
/// for its whole lifetime. Wrap the uploader in an [`Arc`] to call
/// [`stop`](Self::stop) or [`abort`](Self::abort) from another task
/// while [`start`](Self::start) runs.
pub struct Uploader<T: UploadTransport> {
    transport: Arc<T>,
    config: UploaderConfig,
    sizer: ChunkSizer,
    data: Vec<u8>,
    file: Mutex<FileRecord>,
    file_id: Mutex<Option<String>>,
    session: Mutex<Session>,
    state_tx: watch::Sender<UploadState>,
    state_rx: watch::Receiver<UploadState>,
    callbacks: Callbacks,
}

impl<T: UploadTransport> Uploader<T> {
    /// Build an uploader for `data` described by `record`.
    ///
    /// The record's owning store is forced to the configured store
    /// name; its id stays empty until [`start`](Self::start) inserts it.
    pub fn new(transport: Arc<T>, config: UploaderConfig, mut record: FileRecord, data: Vec<u8>) -> Self {
        record.store = config.store.clone();
        let sizer = ChunkSizer::new(config.adaptive, config.capacity, config.max_chunk_size);
        let (state_tx, state_rx) = watch::channel(UploadState::idle());
        let session = Session {
            offset: 0,
            loaded: 0,
            tries: 0,
            chunk_len: config.chunk_size,
        };
        Self {
            transport,
            config,
            sizer,
            data,
            file: Mutex::new(record),
            file_id: Mutex::new(None),
            session: Mutex::new(session),
            state_tx,
            state_rx,
            callbacks: Callbacks::default(),
        }
    }

    /// Hook invoked once the server-side record exists.
    #[must_use]
    pub fn on_create(mut self, hook: impl Fn(&FileRecord) + Send + Sync + 'static) -> Self {
        self.callbacks.on_create = Some(Box::new(hook));
        self
    }

    /// Hook invoked when the session starts or resumes.
    #[must_use]
    pub fn on_start(mut self, hook: impl Fn(&FileRecord) + Send + Sync + 'static) -> Self {
        self.callbacks.on_start = Some(Box::new(hook));
        self
    }

    /// Hook invoked after each acknowledged chunk with the confirmed
    /// fraction, and once more with `1.0` at completion.
    #[must_use]
    pub fn on_progress(mut self, hook: impl Fn(&FileRecord, f64) + Send + Sync + 'static) -> Self {
        self.callbacks.on_progress = Some(Box::new(hook));
        self
    }

    /// Hook invoked with the finalized record.
    #[must_use]
    pub fn on_complete(mut self, hook: impl Fn(&FileRecord) + Send + Sync + 'static) -> Self {
        self.callbacks.on_complete = Some(Box::new(hook));
        self
    }

    /// Hook invoked when the session is paused by [`stop`](Self::stop).
    #[must_use]
    pub fn on_stop(mut self, hook: impl Fn(&FileRecord) + Send + Sync + 'static) -> Self {
        self.callbacks.on_stop = Some(Box::new(hook));
        self
    }

    /// Hook invoked after an abort removed the server-side record.
    #[must_use]
    pub fn on_abort(mut self, hook: impl Fn(&FileRecord) + Send + Sync + 'static) -> Self {
        self.callbacks.on_abort = Some(Box::new(hook));
        self
    }

    /// Hook invoked with permanent session errors.
    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&UploadError) + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Box::new(hook));
        self
    }

    /// Total bytes of the session buffer.
    #[must_use]
    pub fn total(&self) -> usize {
        self.data.len()
    }

    /// Bytes confirmed persisted so far.
    #[must_use]
    pub fn loaded(&self) -> u64 {
        self.state_rx.borrow().loaded
    }

    /// Confirmed progress fraction.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.state_rx.borrow().progress
    }

    /// Whether a chunk loop currently owns the session.
    #[must_use]
    pub fn is_uploading(&self) -> bool {
        self.state_rx.borrow().uploading
    }

    /// Whether the session finalized successfully.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state_rx.borrow().complete
    }

    /// Snapshot of the local file record.
    #[must_use]
    pub fn file(&self) -> FileRecord {
        self.file.lock().expect("file lock poisoned").clone()
    }

    /// The server-side record id, once created.
    #[must_use]
    pub fn file_id(&self) -> Option<String> {
        self.file_id.lock().expect("file id lock poisoned").clone()
    }

    /// Subscribe to session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state_tx.subscribe()
    }

    /// Start or resume the session.
    ///
    /// A no-op when already uploading or complete. Creates the
    /// server-side record on first start; resumes from the last
    /// acknowledged offset otherwise - no bytes are re-sent or skipped.
    /// Runs until the upload completes, the session is stopped, or a
    /// permanent error aborts it.
    pub async fn start(self: &Arc<Self>) -> Result<(), UploadError> {
        {
            let state = self.state_rx.borrow();
            if state.uploading || state.complete {
                return Ok(());
            }
        }
        if let Some(hook) = &self.callbacks.on_start {
            hook(&self.file());
        }

        let file_id = match self.file_id() {
            Some(id) => {
                // Resuming a stopped session: mark the record as
                // uploading again and continue from the saved offset.
                self.transport
                    .set_uploading(&id, &self.config.store, true)
                    .await
                    .map_err(UploadError::Resume)?;
                id
            }
            None => {
                let record = self.file();
                match self.transport.create(record).await {
                    Ok(id) => {
                        self.file.lock().expect("file lock poisoned").id = id.clone();
                        *self.file_id.lock().expect("file id lock poisoned") = Some(id.clone());
                        tracing::debug!(file_id = %id, store = %self.config.store, "record created");
                        if let Some(hook) = &self.callbacks.on_create {
                            hook(&self.file());
                        }
                        id
                    }
                    Err(err) => {
                        let err = UploadError::Create(err);
                        self.emit_error(&err);
                        return Err(err);
                    }
                }
            }
        };

        self.state_tx.send_modify(|state| state.uploading = true);
        self.run(&file_id).await
    }

    /// Pause the session without deleting the record.
    ///
    /// The saved offset survives, so [`start`](Self::start) resumes the
    /// transfer later. A no-op when the session is not uploading.
    pub async fn stop(&self) {
        if !self.is_uploading() {
            return;
        }
        self.state_tx.send_modify(|state| state.uploading = false);
        if let Some(id) = self.file_id() {
            if let Err(err) = self
                .transport
                .set_uploading(&id, &self.config.store, false)
                .await
            {
                tracing::error!(file_id = %id, error = %err, "cannot mark record stopped");
            }
        }
        if let Some(hook) = &self.callbacks.on_stop {
            hook(&self.file());
        }
    }

    /// Abort the session and delete the incomplete server-side record.
    ///
    /// A no-op when the session is idle. An in-flight chunk request is
    /// not interrupted, but no further chunk is scheduled.
    pub async fn abort(&self) {
        if !self.is_uploading() {
            return;
        }
        self.abort_session().await;
    }

    async fn abort_session(&self) {
        self.state_tx.send_modify(|state| state.uploading = false);
        let Some(id) = self.file_id() else {
            return;
        };
        match self.transport.remove(&id, &self.config.store).await {
            Ok(()) => {
                *self.file_id.lock().expect("file id lock poisoned") = None;
                {
                    let mut session = self.session.lock().expect("session lock poisoned");
                    session.offset = 0;
                    session.loaded = 0;
                    session.tries = 0;
                    session.chunk_len = self.config.chunk_size;
                }
                self.state_tx.send_modify(|state| {
                    state.complete = false;
                    state.progress = 0.0;
                    state.loaded = 0;
                });
                tracing::debug!(file_id = %id, "session aborted, record removed");
                if let Some(hook) = &self.callbacks.on_abort {
                    hook(&self.file());
                }
            }
            Err(err) => {
                tracing::error!(file_id = %id, error = %err, "cannot remove aborted record");
            }
        }
    }

    /// Sequential chunk loop. One chunk in flight at a time.
    async fn run(self: &Arc<Self>, file_id: &str) -> Result<(), UploadError> {
        let total = self.data.len();
        loop {
            {
                let state = self.state_rx.borrow();
                if !state.uploading || state.complete {
                    // Stopped or aborted between acknowledgments.
                    return Ok(());
                }
            }

            let (offset, chunk_len) = {
                let session = self.session.lock().expect("session lock poisoned");
                (session.offset, session.chunk_len)
            };
            if offset >= total {
                return self.finalize(file_id).await;
            }

            let length = chunk_len.min(total - offset);
            let chunk = &self.data[offset..offset + length];
            let declared = (offset + length) as f64 / total as f64;
            let sent_at = Instant::now();

            match self
                .transport
                .write_chunk(chunk, file_id, &self.config.store, declared)
                .await
            {
                Ok(bytes) => {
                    let duration = sent_at.elapsed();
                    let loaded = {
                        let mut session = self.session.lock().expect("session lock poisoned");
                        session.offset += bytes;
                        session.loaded += bytes;
                        session.tries = 0;
                        session.chunk_len = self.sizer.next(session.chunk_len, bytes, duration);
                        session.loaded
                    };
                    let fraction = loaded as f64 / total as f64;
                    self.state_tx.send_modify(|state| {
                        state.progress = fraction;
                        state.loaded = loaded as u64;
                    });
                    tracing::trace!(
                        file_id,
                        offset = offset + bytes,
                        total,
                        chunk = bytes,
                        "chunk acknowledged"
                    );
                    if let Some(hook) = &self.callbacks.on_progress {
                        hook(&self.file(), fraction);
                    }
                }
                Err(err) => {
                    let tries = {
                        let mut session = self.session.lock().expect("session lock poisoned");
                        session.tries += 1;
                        session.tries
                    };
                    if err.is_retryable() && tries < self.config.max_tries {
                        tracing::debug!(
                            file_id,
                            offset,
                            tries,
                            error = %err,
                            "chunk failed, retrying"
                        );
                        tokio::time::sleep(RETRY_DELAY).await;
                        // The loop head re-checks the uploading flag, so
                        // a stop or abort during the delay wins.
                    } else {
                        let err = UploadError::Chunk { tries, source: err };
                        self.abort_session().await;
                        self.emit_error(&err);
                        return Err(err);
                    }
                }
            }
        }
    }

    async fn finalize(&self, file_id: &str) -> Result<(), UploadError> {
        match self
            .transport
            .complete(file_id, &self.config.store)
            .await
        {
            Ok(finalized) => {
                *self.file.lock().expect("file lock poisoned") = finalized.clone();
                self.state_tx.send_modify(|state| {
                    state.uploading = false;
                    state.complete = true;
                    state.progress = 1.0;
                });
                tracing::info!(file_id, size = finalized.size, "upload complete");
                if let Some(hook) = &self.callbacks.on_progress {
                    hook(&finalized, 1.0);
                }
                if let Some(hook) = &self.callbacks.on_complete {
                    hook(&finalized);
                }
                Ok(())
            }
            Err(err) => {
                let err = UploadError::Complete(err);
                self.abort_session().await;
                Err(err)
            }
        }
    }

    fn emit_error(&self, err: &UploadError) {
        tracing::error!(error = %err, "upload failed");
        if let Some(hook) = &self.callbacks.on_error {
            hook(err);
        }
    }
}
