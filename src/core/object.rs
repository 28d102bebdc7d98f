//! Object facade
//!
//! [`HardObject`] wraps any [`RemoteObject`] and hands out
//! [`ResilientReader`]s instead of raw streams. Every other operation is
//! forwarded to the wrapped object unchanged.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use steadfast_core_resilience::RetryPolicy;
use tracing::debug;

use super::options::split_open_options;
use super::reader::ResilientReader;
use crate::backend::{BackendResult, HashKind, ObjectMetadata, ObjectStream, OpenOption, RemoteObject};

/// Object whose reads survive dropped connections
#[derive(Clone)]
pub struct HardObject {
    inner: Arc<dyn RemoteObject>,
    policy: RetryPolicy,
}

impl HardObject {
    pub fn new(inner: Arc<dyn RemoteObject>) -> Self {
        Self {
            inner,
            policy: RetryPolicy::default(),
        }
    }

    /// Use `policy` for every reader opened from this object
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Create a reader honoring the given directives
    ///
    /// The last seek and the last range win, and a range overrides a seek.
    /// Ranges are decoded against the object's size. Nothing touches the
    /// network until the first read.
    pub fn open(&self, options: &[OpenOption]) -> ResilientReader {
        let window = split_open_options(options, self.inner.size());
        debug!(
            remote = %self.inner.remote(),
            offset = window.offset,
            limit = ?window.limit,
            passthrough = window.passthrough.len(),
            "new reader"
        );
        ResilientReader::new(
            Arc::clone(&self.inner),
            window.offset,
            window.limit,
            window.passthrough,
        )
        .with_policy(self.policy.clone())
    }

    pub fn remote(&self) -> &str {
        self.inner.remote()
    }

    pub fn size(&self) -> u64 {
        self.inner.size()
    }

    pub async fn hash(&self, kind: HashKind) -> BackendResult<Option<String>> {
        self.inner.hash(kind).await
    }

    pub async fn metadata(&self) -> BackendResult<Option<ObjectMetadata>> {
        self.inner.metadata().await
    }

    pub fn mime_type(&self) -> Option<String> {
        self.inner.mime_type()
    }

    pub fn id(&self) -> Option<String> {
        self.inner.id()
    }

    pub fn tier(&self) -> Option<String> {
        self.inner.tier()
    }

    pub async fn set_tier(&self, tier: &str) -> BackendResult<()> {
        self.inner.set_tier(tier).await
    }

    pub async fn remove(&self) -> BackendResult<()> {
        self.inner.remove().await
    }

    /// The wrapped object
    pub fn unwrap(&self) -> &Arc<dyn RemoteObject> {
        &self.inner
    }
}

impl fmt::Display for HardObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hard: {}", self.inner.remote())
    }
}

impl fmt::Debug for HardObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardObject")
            .field("remote", &self.inner.remote())
            .field("backend", &self.inner.backend_name())
            .field("policy", &self.policy)
            .finish()
    }
}

#[async_trait]
impl RemoteObject for HardObject {
    fn remote(&self) -> &str {
        self.inner.remote()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    async fn open(&self, options: &[OpenOption]) -> BackendResult<Box<dyn ObjectStream>> {
        Ok(Box::new(HardObject::open(self, options)))
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
        "hard"
    }
}
