//! Byte transform pipeline.
//!
//! A [`Transform`] sits between an incoming byte stream and the storage
//! adapter's write stream (and symmetrically on the read side). The
//! default is a direct pipe; encrypting or re-encoding stores implement
//! their own.

use crate::adapter::{ByteReader, ByteWriter};
use async_trait::async_trait;
use skiff_core::record::FileRecord;
use std::io;

/// Read-stream to write-stream byte transform.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Pipe `reader` into `writer` on the write path, returning the
    /// number of bytes written. The writer is not shut down here; the
    /// pipeline owns stream lifecycle.
    async fn write(
        &self,
        reader: &mut ByteReader,
        writer: &mut ByteWriter,
        record: &FileRecord,
    ) -> io::Result<u64> {
        let _ = record;
        tokio::io::copy(reader, writer).await
    }

    /// Pipe stored bytes back out on the read path.
    async fn read(
        &self,
        reader: &mut ByteReader,
        writer: &mut ByteWriter,
        record: &FileRecord,
    ) -> io::Result<u64> {
        let _ = record;
        tokio::io::copy(reader, writer).await
    }
}

/// Direct byte passthrough, the default transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl Transform for Passthrough {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAdapter;
    use crate::StorageAdapter;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn passthrough_copies_bytes() {
        let adapter = MemoryAdapter::new("mem");
        let record = FileRecord::new("x.bin");

        let mut reader: ByteReader = Box::new(std::io::Cursor::new(b"payload".to_vec()));
        let mut writer = adapter.write_stream("f1").await.unwrap();
        let written = Passthrough
            .write(&mut reader, &mut writer, &record)
            .await
            .unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(written, 7);
        assert_eq!(adapter.bytes("f1").unwrap(), b"payload");
    }
}
