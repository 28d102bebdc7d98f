//! Local filesystem object implementation
//!
//! Objects are plain files below a root directory. Reads go through
//! `tokio::fs` and are served as 64 KiB chunks, the same shape a network SDK
//! returns, so the whole pipeline is exercised against real files.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::chunked::ChunkedStream;
use super::error::{BackendError, BackendResult};
use super::types::{requested_window, HashKind, Hasher, ObjectMetadata, OpenOption};
use super::{ObjectStream, RemoteObject};

const CHUNK_SIZE: usize = 64 * 1024; // 64 KB chunks

/// Root directory holding local objects
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Look up an object by its path relative to the root
    pub async fn object(&self, remote: &str) -> BackendResult<LocalObject> {
        let remote = remote.trim_start_matches('/');
        let path = self.root.join(remote);

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| map_io_error(e, remote))?;

        if !metadata.is_file() {
            return Err(BackendError::NotFound {
                remote: remote.to_string(),
                backend: "local".to_string(),
            });
        }

        Ok(LocalObject {
            remote: remote.to_string(),
            path,
            size: metadata.len(),
        })
    }
}

/// A file on local disk
#[derive(Debug, Clone)]
pub struct LocalObject {
    remote: String,
    path: PathBuf,
    size: u64,
}

impl LocalObject {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn map_io_error(err: std::io::Error, remote: &str) -> BackendError {
    match err.kind() {
        std::io::ErrorKind::NotFound => BackendError::NotFound {
            remote: remote.to_string(),
            backend: "local".to_string(),
        },
        std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied {
            remote: remote.to_string(),
            message: err.to_string(),
        },
        _ => BackendError::Io(err),
    }
}

#[async_trait]
impl RemoteObject for LocalObject {
    fn remote(&self) -> &str {
        &self.remote
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn open(&self, options: &[OpenOption]) -> BackendResult<Box<dyn ObjectStream>> {
        let (start, end) = requested_window(&self.remote, options, self.size)?;

        let mut file = fs::File::open(&self.path)
            .await
            .map_err(|e| map_io_error(e, &self.remote))?;
        if start > 0 {
            file.seek(SeekFrom::Start(start))
                .await
                .map_err(BackendError::from)?;
        }

        let reader = file.take(end - start);
        let stream = stream::unfold(
            (reader, vec![0u8; CHUNK_SIZE]),
            |(mut reader, mut buffer)| async move {
                match reader.read(&mut buffer).await {
                    Ok(0) => None, // EOF
                    Ok(n) => {
                        let data = Bytes::copy_from_slice(&buffer[..n]);
                        Some((Ok(data), (reader, buffer)))
                    }
                    Err(e) => Some((Err(e), (reader, buffer))),
                }
            },
        );

        Ok(Box::new(ChunkedStream::new(
            self.remote.clone(),
            Box::pin(stream),
        )))
    }

    async fn hash(&self, kind: HashKind) -> BackendResult<Option<String>> {
        let mut file = fs::File::open(&self.path)
            .await
            .map_err(|e| map_io_error(e, &self.remote))?;

        let mut hasher = Hasher::new(kind);
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let n = file.read(&mut buffer).await.map_err(BackendError::from)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(Some(hasher.finish_hex()))
    }

    async fn metadata(&self) -> BackendResult<Option<ObjectMetadata>> {
        let meta = fs::metadata(&self.path)
            .await
            .map_err(|e| map_io_error(e, &self.remote))?;

        let mut metadata = ObjectMetadata::new();
        metadata.insert("size".to_string(), meta.len().to_string());
        if let Some(mtime) = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        {
            metadata.insert("mtime".to_string(), mtime.as_secs().to_string());
        }
        Ok(Some(metadata))
    }

    async fn remove(&self) -> BackendResult<()> {
        fs::remove_file(&self.path)
            .await
            .map_err(|e| map_io_error(e, &self.remote))
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}
