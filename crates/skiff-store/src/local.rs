//! Filesystem storage adapter.
//!
//! Stores each file as `<root>/<file id>`. Writes go to a temporary
//! sibling (`<id>.part`) and are renamed into place on shutdown, so a
//! torn write never leaves a half-written file under the final name.

use crate::adapter::{ByteReader, ByteWriter, StorageAdapter};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs;
use tokio::io::AsyncWrite;

/// Adapter persisting files under a root directory.
pub struct LocalAdapter {
    name: String,
    root: PathBuf,
}

impl LocalAdapter {
    /// Create an adapter over `root`, creating the directory if needed.
    pub async fn new(name: impl Into<String>, root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            name: name.into(),
            root,
        })
    }

    /// Root directory of this adapter.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, file_id: &str) -> PathBuf {
        self.root.join(file_id)
    }
}

#[async_trait]
impl StorageAdapter for LocalAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_stream(&self, file_id: &str) -> io::Result<ByteReader> {
        let file = fs::File::open(self.path_of(file_id)).await?;
        Ok(Box::new(file))
    }

    async fn write_stream(&self, file_id: &str) -> io::Result<ByteWriter> {
        let final_path = self.path_of(file_id);
        let part_path = self.root.join(format!("{file_id}.part"));
        let file = fs::File::create(&part_path).await?;
        Ok(Box::new(AtomicFileWriter {
            file: Some(file),
            part_path,
            final_path,
            rename: None,
        }))
    }

    async fn delete(&self, file_id: &str) -> io::Result<()> {
        fs::remove_file(self.path_of(file_id)).await
    }
}

type RenameFuture = Pin<Box<dyn std::future::Future<Output = io::Result<()>> + Send>>;

/// Write-to-temp-then-rename file writer.
struct AtomicFileWriter {
    file: Option<fs::File>,
    part_path: PathBuf,
    final_path: PathBuf,
    rename: Option<RenameFuture>,
}

impl AsyncWrite for AtomicFileWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_write(cx, data),
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write after shutdown",
            ))),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Finish the file handle first, then rename into place.
        if let Some(file) = self.file.as_mut() {
            match Pin::new(file).poll_shutdown(cx) {
                Poll::Ready(Ok(())) => {
                    self.file = None;
                    let part = self.part_path.clone();
                    let target = self.final_path.clone();
                    self.rename = Some(Box::pin(async move { fs::rename(part, target).await }));
                }
                other => return other,
            }
        }
        match self.rename.as_mut() {
            Some(rename) => {
                let result = std::task::ready!(rename.as_mut().poll(cx));
                self.rename = None;
                Poll::Ready(result)
            }
            None => Poll::Ready(Ok(())),
        }
    }
}

impl Drop for AtomicFileWriter {
    fn drop(&mut self) {
        // Abandoned write: drop the handle and clean the temp file.
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.part_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn adapter() -> (LocalAdapter, TempDir) {
        let dir = TempDir::new().unwrap();
        let adapter = LocalAdapter::new("disk", dir.path()).await.unwrap();
        (adapter, dir)
    }

    #[tokio::test]
    async fn write_read_delete_roundtrip() {
        let (adapter, _dir) = adapter().await;

        let mut ws = adapter.write_stream("f1").await.unwrap();
        ws.write_all(b"on disk").await.unwrap();
        ws.shutdown().await.unwrap();

        let mut rs = adapter.read_stream("f1").await.unwrap();
        let mut out = Vec::new();
        rs.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"on disk");

        adapter.delete("f1").await.unwrap();
        assert!(adapter.read_stream("f1").await.is_err());
    }

    #[tokio::test]
    async fn unfinished_write_is_invisible() {
        let (adapter, dir) = adapter().await;

        let mut ws = adapter.write_stream("f1").await.unwrap();
        ws.write_all(b"torn").await.unwrap();
        drop(ws);

        assert!(adapter.read_stream("f1").await.is_err());
        assert!(!dir.path().join("f1.part").exists());
    }

    #[tokio::test]
    async fn rewrites_replace_previous_bytes() {
        let (adapter, _dir) = adapter().await;

        for payload in [b"first".as_slice(), b"second!".as_slice()] {
            let mut ws = adapter.write_stream("f1").await.unwrap();
            ws.write_all(payload).await.unwrap();
            ws.shutdown().await.unwrap();
        }

        let mut rs = adapter.read_stream("f1").await.unwrap();
        let mut out = Vec::new();
        rs.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"second!");
    }
}
