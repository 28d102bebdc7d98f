//! Adapter from chunk streams to byte-stream handles

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use futures::StreamExt;

use super::error::{BackendError, BackendResult, StreamError};
use super::types::ReadStream;
use super::ObjectStream;

/// [`ObjectStream`] over a [`ReadStream`] of `Bytes` chunks
///
/// Chunks larger than the caller's buffer are kept and handed out over
/// several reads.
pub struct ChunkedStream {
    remote: String,
    inner: Option<ReadStream>,
    pending: Bytes,
}

impl ChunkedStream {
    pub fn new(remote: impl Into<String>, inner: ReadStream) -> Self {
        Self {
            remote: remote.into(),
            inner: Some(inner),
            pending: Bytes::new(),
        }
    }
}

#[async_trait]
impl ObjectStream for ChunkedStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            let inner = self.inner.as_mut().ok_or_else(|| BackendError::StreamClosed {
                remote: self.remote.clone(),
            })?;

            match inner.next().await {
                None => return Ok(0),
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(e)) => return Err(StreamError::from(e)),
            }
        }

        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }

    async fn close(&mut self) -> BackendResult<()> {
        self.pending.clear();
        match self.inner.take() {
            Some(_) => Ok(()),
            None => Err(BackendError::StreamClosed {
                remote: self.remote.clone(),
            }),
        }
    }
}
