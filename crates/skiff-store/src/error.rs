//! Error types for store operations.

use skiff_core::error::{ErrorCode, CODE_BAD_REQUEST, CODE_INTERNAL, CODE_NOT_FOUND};
use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced file id is unknown.
    #[error("file {0} not found")]
    NotFound(String),

    /// Malformed record or configuration. Surfaced immediately, never
    /// retried.
    #[error("invalid record: {0}")]
    Validation(String),

    /// Adapter read/write failure inside the server pipeline. Terminal
    /// for the write attempt; retry is the client's responsibility.
    #[error("storage stream error: {0}")]
    Stream(#[from] std::io::Error),

    /// Replication target name is not registered.
    #[error("unknown store {0}")]
    UnknownStore(String),

    /// Copy to a secondary store failed. Isolated to that target.
    #[error("replication to {target} failed: {source}")]
    Replication {
        /// Target store name.
        target: String,
        /// Underlying failure.
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Wrap an error as a replication failure against a target.
    pub fn replication(target: impl Into<String>, source: StoreError) -> Self {
        Self::Replication {
            target: target.into(),
            source: Box::new(source),
        }
    }
}

impl ErrorCode for StoreError {
    fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) => CODE_NOT_FOUND,
            Self::Validation(_) => CODE_BAD_REQUEST,
            Self::UnknownStore(_) => CODE_NOT_FOUND,
            Self::Stream(_) | Self::Replication { .. } => CODE_INTERNAL,
        }
    }
}
