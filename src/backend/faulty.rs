//! Fault injection for remote objects
//!
//! [`FaultyObject`] wraps any [`RemoteObject`] and consumes one scripted
//! [`Fault`] per open attempt, so tests (and the CLI's `--inject-faults`)
//! can reproduce dropped connections and refused opens deterministically.
//!
//! # Example
//!
//! ```
//! use steadfast::backend::{Fault, FaultPlan, FaultyObject, MemoryObject};
//! use std::sync::Arc;
//!
//! let plan = FaultPlan::script([Fault::RejectOpen, Fault::DropAfter(3)]);
//! let object = FaultyObject::new(Arc::new(MemoryObject::new("digits", "0123456789")), plan);
//! assert_eq!(object.open_attempts(), 0);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::error::{BackendError, BackendResult, StreamError};
use super::types::{HashKind, ObjectMetadata, OpenOption};
use super::{ObjectStream, RemoteObject};

/// Behaviour injected into a single open attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Open and stream normally
    Healthy,

    /// Fail the open with a retriable connection error
    RejectOpen,

    /// Fail the open with a permanent not-found error
    RejectOpenPermanently,

    /// Deliver `n` bytes cleanly; the next read fails with nothing transferred
    DropAfter(usize),

    /// A read crossing byte `n` delivers up to `n` and fails in the same call
    CutAfter(usize),

    /// Stream normally, but fail when the handle is released
    FailClose,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Healthy => write!(f, "healthy"),
            Fault::RejectOpen => write!(f, "reject-open"),
            Fault::RejectOpenPermanently => write!(f, "reject-open-permanently"),
            Fault::DropAfter(n) => write!(f, "drop-after:{}", n),
            Fault::CutAfter(n) => write!(f, "cut-after:{}", n),
            Fault::FailClose => write!(f, "fail-close"),
        }
    }
}

impl FromStr for Fault {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };

        let bytes = || -> Result<usize, String> {
            arg.ok_or_else(|| format!("fault '{}' needs a byte count", name))?
                .parse::<usize>()
                .map_err(|e| format!("invalid byte count in '{}': {}", s, e))
        };

        match name {
            "healthy" => Ok(Fault::Healthy),
            "reject-open" => Ok(Fault::RejectOpen),
            "reject-open-permanently" => Ok(Fault::RejectOpenPermanently),
            "drop-after" => Ok(Fault::DropAfter(bytes()?)),
            "cut-after" => Ok(Fault::CutAfter(bytes()?)),
            "fail-close" => Ok(Fault::FailClose),
            other => Err(format!("unknown fault '{}'", other)),
        }
    }
}

/// Ordered faults, one per open attempt, then a fallback for every later open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultPlan {
    faults: VecDeque<Fault>,
    fallback: Fault,
}

impl Default for FaultPlan {
    fn default() -> Self {
        Self {
            faults: VecDeque::new(),
            fallback: Fault::Healthy,
        }
    }
}

impl FaultPlan {
    /// Scripted faults followed by healthy opens
    pub fn script(faults: impl IntoIterator<Item = Fault>) -> Self {
        Self {
            faults: faults.into_iter().collect(),
            fallback: Fault::Healthy,
        }
    }

    /// The same fault on every open
    pub fn always(fault: Fault) -> Self {
        Self {
            faults: VecDeque::new(),
            fallback: fault,
        }
    }

    /// Replace the fallback used once the script is exhausted
    pub fn then(mut self, fallback: Fault) -> Self {
        self.fallback = fallback;
        self
    }

    fn next_fault(&mut self) -> Fault {
        self.faults.pop_front().unwrap_or(self.fallback)
    }
}

impl FromStr for FaultPlan {
    type Err = String;

    /// Comma-separated faults, e.g. `reject-open,drop-after:1024,healthy`
    ///
    /// An entry `then:<fault>` sets the fault used once the script runs out,
    /// e.g. `healthy,then:reject-open` fails every open after the first.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut faults = Vec::new();
        let mut fallback = Fault::Healthy;

        for part in s.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            match part.strip_prefix("then:") {
                Some(rest) => fallback = rest.parse()?,
                None => faults.push(part.parse()?),
            }
        }
        Ok(FaultPlan::script(faults).then(fallback))
    }
}

/// [`RemoteObject`] wrapper that injects scripted failures
pub struct FaultyObject {
    inner: Arc<dyn RemoteObject>,
    plan: Mutex<FaultPlan>,
    opened_with: Mutex<Vec<Vec<OpenOption>>>,
    closes: Arc<AtomicUsize>,
}

impl FaultyObject {
    pub fn new(inner: Arc<dyn RemoteObject>, plan: FaultPlan) -> Self {
        Self {
            inner,
            plan: Mutex::new(plan),
            opened_with: Mutex::new(Vec::new()),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of open attempts, failed ones included
    pub fn open_attempts(&self) -> usize {
        self.opened_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Directives passed to every open attempt, in order
    pub fn opened_with(&self) -> Vec<Vec<OpenOption>> {
        self.opened_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of handles released through `close`
    pub fn closed_streams(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteObject for FaultyObject {
    fn remote(&self) -> &str {
        self.inner.remote()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    async fn open(&self, options: &[OpenOption]) -> BackendResult<Box<dyn ObjectStream>> {
        self.opened_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(options.to_vec());
        let fault = self
            .plan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_fault();

        match fault {
            Fault::RejectOpen => {
                return Err(BackendError::ConnectionFailed {
                    backend: "faulty".to_string(),
                    endpoint: self.inner.remote().to_string(),
                    source: None,
                })
            }
            Fault::RejectOpenPermanently => {
                return Err(BackendError::NotFound {
                    remote: self.inner.remote().to_string(),
                    backend: "faulty".to_string(),
                })
            }
            _ => {}
        }

        let inner = self.inner.open(options).await?;
        Ok(Box::new(FaultyStream {
            inner,
            fault,
            delivered: 0,
            closes: Arc::clone(&self.closes),
        }))
    }

    async fn hash(&self, kind: HashKind) -> BackendResult<Option<String>> {
        self.inner.hash(kind).await
    }

    async fn metadata(&self) -> BackendResult<Option<ObjectMetadata>> {
        self.inner.metadata().await
    }

    fn mime_type(&self) -> Option<String> {
        self.inner.mime_type()
    }

    fn id(&self) -> Option<String> {
        self.inner.id()
    }

    fn tier(&self) -> Option<String> {
        self.inner.tier()
    }

    async fn set_tier(&self, tier: &str) -> BackendResult<()> {
        self.inner.set_tier(tier).await
    }

    async fn remove(&self) -> BackendResult<()> {
        self.inner.remove().await
    }

    fn backend_name(&self) -> &str {
        "faulty"
    }
}

struct FaultyStream {
    inner: Box<dyn ObjectStream>,
    fault: Fault,
    delivered: usize,
    closes: Arc<AtomicUsize>,
}

fn connection_reset() -> BackendError {
    BackendError::network("injected connection reset")
}

#[async_trait]
impl ObjectStream for FaultyStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        match self.fault {
            Fault::DropAfter(cutoff) => {
                if self.delivered >= cutoff {
                    return Err(connection_reset().into());
                }
                let window = buf.len().min(cutoff - self.delivered);
                let n = self.inner.read(&mut buf[..window]).await?;
                self.delivered += n;
                Ok(n)
            }
            Fault::CutAfter(cutoff) => {
                if self.delivered >= cutoff {
                    return Err(connection_reset().into());
                }
                let remaining = cutoff - self.delivered;
                if buf.len() <= remaining {
                    let n = self.inner.read(buf).await?;
                    self.delivered += n;
                    return Ok(n);
                }

                let n = self.inner.read(&mut buf[..remaining]).await?;
                self.delivered += n;
                if n == 0 {
                    return Ok(0);
                }
                Err(StreamError::new(n, connection_reset()))
            }
            _ => {
                let n = self.inner.read(buf).await?;
                self.delivered += n;
                Ok(n)
            }
        }
    }

    async fn close(&mut self) -> BackendResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await?;
        if self.fault == Fault::FailClose {
            return Err(BackendError::Other {
                backend: "faulty".to_string(),
                message: "injected close failure".to_string(),
            });
        }
        Ok(())
    }
}
