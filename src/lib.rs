/*!
 * Steadfast - resilient ranged reads over unreliable object stores
 *
 * Wraps a remote object so that reading it looks like one uninterrupted
 * forward byte stream:
 * - Reconnects at the exact next offset after a dropped connection
 * - Honors seek and byte-range requests, bounded client-side
 * - Bounded exponential backoff between reopen attempts
 * - Local, in-memory and fault-injecting object implementations
 */

pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use backend::{BackendError, ObjectStream, OpenOption, RangeSpec, RemoteObject};
pub use config::SteadfastConfig;
pub use core::{HardObject, ReadOutcome, ResilientReader};
pub use error::{ReaderError, Result, SteadfastError};
pub use steadfast_core_resilience::RetryPolicy;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
