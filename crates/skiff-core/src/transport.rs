//! Upload transport seam.
//!
//! The wire protocol between an uploader and a store is transport
//! agnostic: five request/response operations carrying numeric error
//! codes. The uploader only ever talks to this trait; servers expose it
//! over whatever channel they like. `skiff-store` ships an in-process
//! loopback implementation used by the CLI and the test suite.

use crate::error::{ErrorCode, CODE_INTERNAL, CODE_NOT_FOUND};
use crate::record::FileRecord;
use async_trait::async_trait;
use thiserror::Error;

/// A transport-level failure carrying a protocol error code.
///
/// Codes 400 and 404 are permanent; everything else (timeouts, busy
/// servers, transient I/O) is retryable by the uploader.
#[derive(Debug, Clone, Error)]
#[error("transport error {code}: {message}")]
pub struct TransportError {
    /// Numeric protocol code.
    pub code: u16,
    /// Human-readable description.
    pub message: String,
}

impl TransportError {
    /// Build an error from a code and message.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A 404 for an unknown file id.
    pub fn not_found(file_id: &str) -> Self {
        Self::new(CODE_NOT_FOUND, format!("file {file_id} not found"))
    }

    /// A retryable server-side failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CODE_INTERNAL, message)
    }
}

impl ErrorCode for TransportError {
    fn code(&self) -> u16 {
        self.code
    }
}

/// Request/response channel between an uploader and a named store.
///
/// All operations address records by opaque id plus owning store name.
/// Implementations are expected to serialize concurrent mutations to the
/// same record; the uploader itself sends strictly one chunk at a time.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Insert a new record, returning its assigned id. The target store
    /// is named by `record.store`.
    async fn create(&self, record: FileRecord) -> Result<String, TransportError>;

    /// Append a chunk to the file's pending bytes. Chunks arrive in
    /// strict offset order; the response is the byte count persisted.
    async fn write_chunk(
        &self,
        chunk: &[u8],
        file_id: &str,
        store: &str,
        progress: f64,
    ) -> Result<usize, TransportError>;

    /// Finalize the upload, returning the completed record.
    async fn complete(&self, file_id: &str, store: &str) -> Result<FileRecord, TransportError>;

    /// Flip the record's `uploading` flag (stop and resume paths).
    async fn set_uploading(
        &self,
        file_id: &str,
        store: &str,
        uploading: bool,
    ) -> Result<(), TransportError>;

    /// Remove the record and any pending or stored bytes (abort path).
    async fn remove(&self, file_id: &str, store: &str) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_code() {
        assert!(!TransportError::not_found("x").is_retryable());
        assert!(!TransportError::new(400, "bad").is_retryable());
        assert!(TransportError::internal("busy").is_retryable());
        assert!(TransportError::new(408, "timeout").is_retryable());
    }
}
