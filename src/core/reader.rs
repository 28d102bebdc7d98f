/*!
 * Resilient ranged stream reader
 *
 * Presents one continuous forward byte stream over a remote object whose
 * connections may drop at any time. The reader tracks the absolute offset of
 * the next byte to deliver; whenever the live connection fails it is
 * released and a new one is opened at exactly that offset.
 */

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use steadfast_core_resilience::{RetryBudget, RetryDecision, RetryPolicy};
use tracing::{debug, error, warn};

use super::options::derive_open_options;
use crate::backend::{BackendError, BackendResult, ObjectStream, OpenOption, RemoteObject, StreamError};
use crate::error::ReaderError;

/// What a single read call actually did
///
/// `Recovered` means bytes were delivered but the connection failed in the
/// same call; the failure was absorbed and the next read reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Delivered(usize),
    Recovered(usize),
    EndOfStream,
}

impl ReadOutcome {
    /// Bytes placed into the caller's buffer
    pub fn bytes(&self) -> usize {
        match self {
            ReadOutcome::Delivered(n) | ReadOutcome::Recovered(n) => *n,
            ReadOutcome::EndOfStream => 0,
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ReadOutcome::EndOfStream)
    }
}

/// Counters describing how much recovery a reader needed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Open attempts, successful or not
    pub opens: u64,
    /// Open attempts that failed
    pub failed_opens: u64,
    /// Live streams dropped after a read error
    pub discarded_streams: u64,
    /// Read calls that delivered bytes despite an error
    pub recovered_reads: u64,
    /// Total bytes handed to the caller
    pub bytes_delivered: u64,
}

/// Forward-only reader that reconnects transparently
///
/// Created by [`HardObject::open`](super::object::HardObject::open). No I/O
/// happens until the first [`read`](Self::read).
pub struct ResilientReader {
    object: Option<Arc<dyn RemoteObject>>,
    remote: String,
    passthrough: Vec<OpenOption>,
    offset: u64,
    limit: Option<u64>,
    live: Option<Box<dyn ObjectStream>>,
    eof: bool,
    closed: bool,
    policy: RetryPolicy,
    stats: ReaderStats,
}

impl ResilientReader {
    /// Reader over `object` starting at `offset`, never reading at or past `limit`
    pub fn new(
        object: Arc<dyn RemoteObject>,
        offset: u64,
        limit: Option<u64>,
        passthrough: Vec<OpenOption>,
    ) -> Self {
        Self {
            remote: object.remote().to_string(),
            object: Some(object),
            passthrough,
            offset,
            limit,
            live: None,
            eof: false,
            closed: false,
            policy: RetryPolicy::default(),
            stats: ReaderStats::default(),
        }
    }

    /// Replace the retry policy used when (re)opening
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Absolute position of the next byte to be delivered
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Exclusive upper bound, `None` when reading to the end
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Bytes left before the limit, `None` when unbounded
    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.offset))
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether a connection is currently held
    pub fn has_live_stream(&self) -> bool {
        self.live.is_some()
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Read the next bytes into `buf`
    ///
    /// Returns `Ok(0)` at end of stream (for a non-empty `buf`). Transient
    /// failures are retried internally and never reported, unless the retry
    /// policy gives up.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReaderError> {
        self.read_outcome(buf).await.map(|outcome| outcome.bytes())
    }

    /// Like [`read`](Self::read), but tells a clean read from a recovered one
    pub async fn read_outcome(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, ReaderError> {
        if self.closed {
            return Err(ReaderError::Closed);
        }
        if self.eof {
            return Ok(ReadOutcome::EndOfStream);
        }

        let window = match self.remaining() {
            Some(0) => {
                self.eof = true;
                debug!(remote = %self.remote, offset = self.offset, "limit reached");
                return Ok(ReadOutcome::EndOfStream);
            }
            Some(remaining) => usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len())),
            None => buf.len(),
        };
        if window == 0 {
            return Ok(ReadOutcome::Delivered(0));
        }
        let buf = &mut buf[..window];

        let outcome = self.read_window(buf).await;
        debug!(
            remote = %self.remote,
            offset = self.offset,
            limit = ?self.limit,
            outcome = ?outcome.as_ref().ok(),
            "read result"
        );
        outcome
    }

    async fn read_window(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, ReaderError> {
        let mut budget = RetryBudget::new();

        loop {
            if self.live.is_none() {
                if let Err(err) = self.open_live().await {
                    self.stats.failed_opens += 1;
                    error!(remote = %self.remote, offset = self.offset, error = %err, "err on open");
                    self.back_off(&mut budget, err).await?;
                    continue;
                }
            }

            let Some(stream) = self.live.as_mut() else {
                continue;
            };

            match stream.read(buf).await {
                Ok(0) => {
                    self.eof = true;
                    return Ok(ReadOutcome::EndOfStream);
                }
                Ok(n) => {
                    self.advance(n);
                    return Ok(ReadOutcome::Delivered(n));
                }
                Err(StreamError {
                    transferred,
                    source,
                }) => {
                    warn!(
                        remote = %self.remote,
                        offset = self.offset,
                        transferred,
                        error = %source,
                        "err on read, discarding stream"
                    );
                    self.discard_live().await;

                    if transferred > 0 {
                        self.advance(transferred);
                        self.stats.recovered_reads += 1;
                        return Ok(ReadOutcome::Recovered(transferred));
                    }
                    self.back_off(&mut budget, source).await?;
                }
            }
        }
    }

    async fn open_live(&mut self) -> BackendResult<()> {
        let object = self.object.as_ref().ok_or_else(|| BackendError::StreamClosed {
            remote: self.remote.clone(),
        })?;

        let options = derive_open_options(&self.passthrough, self.offset, self.limit);
        self.stats.opens += 1;
        debug!(
            remote = %self.remote,
            offset = self.offset,
            attempt = self.stats.opens,
            options = ?options,
            "opening stream"
        );

        let stream = object.open(&options).await?;
        self.live = Some(stream);
        Ok(())
    }

    /// Drop the live stream, releasing it first
    async fn discard_live(&mut self) {
        if let Some(mut stream) = self.live.take() {
            self.stats.discarded_streams += 1;
            if let Err(err) = stream.close().await {
                debug!(remote = %self.remote, error = %err, "release of discarded stream failed");
            }
        }
    }

    /// Account for a failure and wait before the next attempt, or give up
    async fn back_off(&mut self, budget: &mut RetryBudget, err: BackendError) -> Result<(), ReaderError> {
        if self.policy.fail_fast_on_permanent && !err.is_retriable() {
            error!(remote = %self.remote, offset = self.offset, error = %err, "permanent failure");
            return Err(ReaderError::Backend(err));
        }

        match budget.record_failure(&self.policy) {
            RetryDecision::Retry { attempt, delay } => {
                debug!(
                    remote = %self.remote,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying"
                );
                if delay.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(delay).await;
                }
                Ok(())
            }
            RetryDecision::Exhausted { attempts } => {
                error!(
                    remote = %self.remote,
                    offset = self.offset,
                    attempts,
                    error = %err,
                    "retries exhausted"
                );
                Err(ReaderError::RetryExhausted { attempts, last: err })
            }
        }
    }

    fn advance(&mut self, n: usize) {
        self.offset += n as u64;
        self.stats.bytes_delivered += n as u64;
    }

    /// Read until end of stream, appending to `out`
    pub async fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize, ReaderError> {
        let mut buf = vec![0u8; 64 * 1024];
        let mut total = 0;
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&buf[..n]);
            total += n;
        }
    }

    /// Close the reader
    ///
    /// Releases the live stream if there is one. The reader is closed
    /// afterwards even if the release fails. Closing twice is an error.
    pub async fn close(&mut self) -> Result<(), ReaderError> {
        if self.closed {
            return Err(ReaderError::Closed);
        }

        let result = match self.live.take() {
            Some(mut stream) => stream.close().await.map_err(ReaderError::Release),
            None => Ok(()),
        };

        self.object = None;
        self.closed = true;
        debug!(remote = %self.remote, offset = self.offset, stats = ?self.stats, "reader closed");
        result
    }
}

impl fmt::Debug for ResilientReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientReader")
            .field("remote", &self.remote)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("live", &self.live.is_some())
            .field("eof", &self.eof)
            .field("closed", &self.closed)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Readers are streams themselves, so wrappers can be stacked
#[async_trait]
impl ObjectStream for ResilientReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        ResilientReader::read(self, buf)
            .await
            .map_err(|err| StreamError::new(0, err.into_backend(&self.remote)))
    }

    async fn close(&mut self) -> BackendResult<()> {
        ResilientReader::close(self)
            .await
            .map_err(|err| err.into_backend(&self.remote))
    }
}
