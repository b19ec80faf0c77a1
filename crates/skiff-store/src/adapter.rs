//! Storage adapter capability trait.
//!
//! A [`StorageAdapter`] is a byte sink/source over some physical backend
//! (filesystem, object storage, whatever). The store treats it as an
//! opaque capability: open a read stream, open a write stream, delete.
//! Each backend is an independent implementation of the trait; there is
//! no base-adapter inheritance.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed byte source for one stored file.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed byte sink for one stored file.
///
/// Writers commit on `shutdown()`; dropping a writer without shutting it
/// down abandons the write.
pub type ByteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Byte read/write/delete capability over a physical backend, addressed
/// by file id.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Adapter name, used as the key of the record's `versions` map.
    fn name(&self) -> &str;

    /// Open a read stream over the stored bytes of `file_id`.
    async fn read_stream(&self, file_id: &str) -> io::Result<ByteReader>;

    /// Open a write stream for `file_id`, replacing any previous bytes.
    async fn write_stream(&self, file_id: &str) -> io::Result<ByteWriter>;

    /// Delete the stored bytes of `file_id`.
    async fn delete(&self, file_id: &str) -> io::Result<()>;
}
