//! In-memory storage adapter.
//!
//! Keeps file bytes in a shared map. Used by the test suites and as the
//! backing of in-process loopback setups; nothing survives the process.

use crate::adapter::{ByteReader, ByteWriter, StorageAdapter};
use async_trait::async_trait;
use dashmap::DashMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Adapter storing file bytes in process memory.
#[derive(Clone)]
pub struct MemoryAdapter {
    name: String,
    blobs: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryAdapter {
    /// Create an empty adapter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blobs: Arc::new(DashMap::new()),
        }
    }

    /// Snapshot the stored bytes of a file, if present.
    #[must_use]
    pub fn bytes(&self, file_id: &str) -> Option<Vec<u8>> {
        self.blobs.get(file_id).map(|entry| entry.value().clone())
    }

    /// Whether the adapter holds bytes for a file.
    #[must_use]
    pub fn contains(&self, file_id: &str) -> bool {
        self.blobs.contains_key(file_id)
    }

    /// Number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the adapter is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_stream(&self, file_id: &str) -> io::Result<ByteReader> {
        let bytes = self
            .bytes(file_id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no blob {file_id}")))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    async fn write_stream(&self, file_id: &str) -> io::Result<ByteWriter> {
        Ok(Box::new(MemoryWriter {
            file_id: file_id.to_string(),
            blobs: Arc::clone(&self.blobs),
            buf: Vec::new(),
            committed: false,
        }))
    }

    async fn delete(&self, file_id: &str) -> io::Result<()> {
        self.blobs
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no blob {file_id}")))
    }
}

/// Buffers writes and commits them to the shared map on shutdown, so a
/// failed or abandoned write never leaves partial bytes visible.
struct MemoryWriter {
    file_id: String,
    blobs: Arc<DashMap<String, Vec<u8>>>,
    buf: Vec<u8>,
    committed: bool,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if !self.committed {
            let bytes = std::mem::take(&mut self.buf);
            self.blobs.insert(self.file_id.clone(), bytes);
            self.committed = true;
        }
        Poll::Ready(Ok(()))
    }
}
