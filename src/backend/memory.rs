//! In-memory object implementation
//!
//! Useful for tests and for serving small, already-buffered payloads through
//! the same interface as remote objects.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::error::{BackendError, BackendResult, StreamError};
use super::types::{requested_window, HashKind, Hasher, ObjectMetadata, OpenOption};
use super::{ObjectStream, RemoteObject};

/// Object whose content lives in memory
///
/// `max_chunk` caps how many bytes a single read returns, imitating a
/// network transport that delivers data in packets.
#[derive(Debug)]
pub struct MemoryObject {
    remote: String,
    data: Bytes,
    max_chunk: Option<usize>,
    mime_type: Option<String>,
    tier: Mutex<Option<String>>,
    removed: AtomicBool,
}

impl MemoryObject {
    pub fn new(remote: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            remote: remote.into(),
            data: data.into(),
            max_chunk: None,
            mime_type: None,
            tier: Mutex::new(None),
            removed: AtomicBool::new(false),
        }
    }

    /// Limit the number of bytes returned per read
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = Some(max_chunk.max(1));
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Start in a storage tier, enabling tier changes
    pub fn with_tier(self, tier: impl Into<String>) -> Self {
        *self.tier.lock().unwrap_or_else(PoisonError::into_inner) = Some(tier.into());
        self
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    fn ensure_present(&self) -> BackendResult<()> {
        if self.is_removed() {
            return Err(BackendError::NotFound {
                remote: self.remote.clone(),
                backend: "memory".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteObject for MemoryObject {
    fn remote(&self) -> &str {
        &self.remote
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn open(&self, options: &[OpenOption]) -> BackendResult<Box<dyn ObjectStream>> {
        self.ensure_present()?;

        let (start, end) = requested_window(&self.remote, options, self.size())?;
        // Window bounds never exceed the buffer length, so these casts are lossless.
        let window = self.data.slice(start as usize..end as usize);

        Ok(Box::new(MemoryStream {
            remote: self.remote.clone(),
            data: window,
            max_chunk: self.max_chunk,
            closed: false,
        }))
    }

    async fn hash(&self, kind: HashKind) -> BackendResult<Option<String>> {
        self.ensure_present()?;
        let mut hasher = Hasher::new(kind);
        hasher.update(&self.data);
        Ok(Some(hasher.finish_hex()))
    }

    async fn metadata(&self) -> BackendResult<Option<ObjectMetadata>> {
        self.ensure_present()?;
        let mut metadata = ObjectMetadata::new();
        metadata.insert("size".to_string(), self.data.len().to_string());
        if let Some(mime_type) = &self.mime_type {
            metadata.insert("content-type".to_string(), mime_type.clone());
        }
        Ok(Some(metadata))
    }

    fn mime_type(&self) -> Option<String> {
        self.mime_type.clone()
    }

    fn tier(&self) -> Option<String> {
        self.tier.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn set_tier(&self, tier: &str) -> BackendResult<()> {
        self.ensure_present()?;
        let mut current = self.tier.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_none() {
            return Err(BackendError::Unsupported {
                backend: "memory".to_string(),
                operation: "set_tier".to_string(),
            });
        }
        *current = Some(tier.to_string());
        Ok(())
    }

    async fn remove(&self) -> BackendResult<()> {
        self.ensure_present()?;
        self.removed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

struct MemoryStream {
    remote: String,
    data: Bytes,
    max_chunk: Option<usize>,
    closed: bool,
}

#[async_trait]
impl ObjectStream for MemoryStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if self.closed {
            return Err(BackendError::StreamClosed {
                remote: self.remote.clone(),
            }
            .into());
        }

        let mut n = buf.len().min(self.data.len());
        if let Some(max_chunk) = self.max_chunk {
            n = n.min(max_chunk);
        }

        let chunk = self.data.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        Ok(n)
    }

    async fn close(&mut self) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::StreamClosed {
                remote: self.remote.clone(),
            });
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RangeSpec;

    async fn read_all(stream: &mut Box<dyn ObjectStream>) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[tokio::test]
    async fn test_full_read() {
        let object = MemoryObject::new("digits", "0123456789");
        let mut stream = object.open(&[]).await.unwrap();
        assert_eq!(read_all(&mut stream).await, b"0123456789");
        stream.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_seek_and_range() {
        let object = MemoryObject::new("digits", "0123456789");

        let mut stream = object.open(&[OpenOption::Seek { offset: 6 }]).await.unwrap();
        assert_eq!(read_all(&mut stream).await, b"6789");

        let mut stream = object
            .open(&[OpenOption::Range(RangeSpec::new(3, 7))])
            .await
            .unwrap();
        assert_eq!(read_all(&mut stream).await, b"34567");

        let mut stream = object
            .open(&[OpenOption::Range(RangeSpec::suffix(2))])
            .await
            .unwrap();
        assert_eq!(read_all(&mut stream).await, b"89");
    }

    #[tokio::test]
    async fn test_max_chunk() {
        let object = MemoryObject::new("digits", "0123456789").with_max_chunk(2);
        let mut stream = object.open(&[]).await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"01");
    }

    #[tokio::test]
    async fn test_removed_object_not_found() {
        let object = MemoryObject::new("gone", "data");
        object.remove().await.unwrap();
        assert!(object.is_removed());

        let err = object.open(&[]).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_tier_changes() {
        let object = MemoryObject::new("cold", "data").with_tier("STANDARD");
        assert_eq!(object.tier().as_deref(), Some("STANDARD"));
        object.set_tier("GLACIER").await.unwrap();
        assert_eq!(object.tier().as_deref(), Some("GLACIER"));

        let untiered = MemoryObject::new("plain", "data");
        assert_eq!(untiered.tier(), None);
        assert!(matches!(
            untiered.set_tier("GLACIER").await,
            Err(BackendError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_hash_and_metadata() {
        let object = MemoryObject::new("abc", "abc").with_mime_type("text/plain");
        assert_eq!(
            object.hash(HashKind::Sha256).await.unwrap().as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );

        let metadata = object.metadata().await.unwrap().unwrap();
        assert_eq!(metadata.get("size").map(String::as_str), Some("3"));
        assert_eq!(
            metadata.get("content-type").map(String::as_str),
            Some("text/plain")
        );
    }
}
