//! Remote object capability
//!
//! This module defines the contract Steadfast requires from an object store:
//! given an object, open a fresh readable byte stream, optionally positioned
//! at an offset or restricted to a byte range. Every open is a new network
//! operation, and both opening and reading may fail transiently.
//!
//! # Features
//!
//! - **Async-first design**: All operations use `async/await` with Tokio runtime
//! - **Trait-based abstraction**: [`RemoteObject`] and [`ObjectStream`] for uniform access
//! - **Implementations**: local files, in-memory objects, and a fault injector
//! - **Adapters**: [`ChunkedStream`] turns SDK-style chunk streams into handles
//!
//! # Examples
//!
//! ```no_run
//! use steadfast::backend::{LocalStore, ObjectStream, OpenOption, RemoteObject};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = LocalStore::new("/data/objects");
//!     let object = store.object("logs/app.log").await?;
//!
//!     let mut stream = object.open(&[OpenOption::Seek { offset: 128 }]).await?;
//!     let mut buf = vec![0u8; 4096];
//!     let n = stream.read(&mut buf).await?;
//!     println!("read {} bytes at offset 128", n);
//!     stream.close().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod types;

mod chunked;
mod faulty;
mod local;
mod memory;

// Re-export main types
pub use chunked::ChunkedStream;
pub use error::{BackendError, BackendResult, StreamError};
pub use faulty::{Fault, FaultPlan, FaultyObject};
pub use local::{LocalObject, LocalStore};
pub use memory::MemoryObject;
pub use types::{requested_window, HashKind, ObjectMetadata, OpenOption, RangeSpec, ReadStream};

use async_trait::async_trait;

/// Open byte-stream handle on a remote object
///
/// A handle is exclusively owned by whoever opened it and is used
/// sequentially.
#[async_trait]
pub trait ObjectStream: Send {
    /// Read the next bytes into `buf`
    ///
    /// Returns `Ok(0)` at the end of the data when `buf` is non-empty. On
    /// failure, [`StreamError::transferred`] reports how many bytes were
    /// already placed at the front of `buf`.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;

    /// Release the handle and any connection behind it
    async fn close(&mut self) -> BackendResult<()>;
}

/// Remote object that can be opened for reading
///
/// # Thread Safety
///
/// Implementors must be `Send + Sync` so one object can be shared behind an
/// `Arc` by many readers.
///
/// # Example Implementation
///
/// ```ignore
/// use steadfast::backend::{BackendResult, ObjectStream, OpenOption, RemoteObject};
/// use async_trait::async_trait;
///
/// struct MyObject;
///
/// #[async_trait]
/// impl RemoteObject for MyObject {
///     fn remote(&self) -> &str { "bucket/key" }
///     fn size(&self) -> u64 { 42 }
///     async fn open(&self, options: &[OpenOption]) -> BackendResult<Box<dyn ObjectStream>> {
///         // Issue a ranged GET here
///     }
/// }
/// ```
#[async_trait]
pub trait RemoteObject: Send + Sync {
    /// Path of the object relative to its store
    fn remote(&self) -> &str;

    /// Total size in bytes as known when the object was looked up
    fn size(&self) -> u64;

    /// Open a new stream honoring the given directives
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the object is gone.
    /// Returns `BackendError::InvalidRange` if the directives cannot be served.
    /// Network failures surface as retriable errors.
    async fn open(&self, options: &[OpenOption]) -> BackendResult<Box<dyn ObjectStream>>;

    /// Checksum of the object, `None` if the backend does not track it
    async fn hash(&self, kind: HashKind) -> BackendResult<Option<String>> {
        let _ = kind;
        Ok(None)
    }

    /// Object metadata, `None` if the backend has none
    async fn metadata(&self) -> BackendResult<Option<ObjectMetadata>> {
        Ok(None)
    }

    /// MIME type, if known
    fn mime_type(&self) -> Option<String> {
        None
    }

    /// Backend-assigned identifier, if any
    fn id(&self) -> Option<String> {
        None
    }

    /// Storage tier (e.g. "STANDARD", "GLACIER"), if the backend has tiers
    fn tier(&self) -> Option<String> {
        None
    }

    /// Move the object to another storage tier
    async fn set_tier(&self, tier: &str) -> BackendResult<()> {
        let _ = tier;
        Err(BackendError::Unsupported {
            backend: self.backend_name().to_string(),
            operation: "set_tier".to_string(),
        })
    }

    /// Delete the object
    async fn remove(&self) -> BackendResult<()> {
        Err(BackendError::Unsupported {
            backend: self.backend_name().to_string(),
            operation: "remove".to_string(),
        })
    }

    /// String identifier for the backend (e.g., "local", "memory")
    fn backend_name(&self) -> &str;
}
