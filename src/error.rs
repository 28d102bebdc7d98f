/*!
 * Error types for Steadfast
 */

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendError;
use steadfast_core_resilience::PolicyError;

pub type Result<T> = std::result::Result<T, SteadfastError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

/// Errors a resilient reader reports to its caller
///
/// Transient backend failures are absorbed by the reader and never appear
/// here unless the retry budget runs out.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Operation attempted after `close`
    #[error("stream is closed")]
    Closed,

    /// Reopening kept failing until the retry policy gave up
    #[error("gave up after {attempts} failed attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: BackendError,
    },

    /// Permanent backend failure, not worth retrying
    #[error(transparent)]
    Backend(BackendError),

    /// Releasing the live stream failed during `close`
    #[error("failed to release stream: {0}")]
    Release(#[source] BackendError),
}

impl ReaderError {
    pub fn is_closed(&self) -> bool {
        matches!(self, ReaderError::Closed)
    }

    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, ReaderError::RetryExhausted { .. })
    }

    /// Flatten into a backend error for stacking readers behind `ObjectStream`
    pub fn into_backend(self, remote: &str) -> BackendError {
        match self {
            ReaderError::Closed => BackendError::StreamClosed {
                remote: remote.to_string(),
            },
            ReaderError::RetryExhausted { last, .. } => last,
            ReaderError::Backend(err) | ReaderError::Release(err) => err,
        }
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("can't point {name} remote at itself - check the value of the remote setting ({remote})")]
    SelfReference { name: String, remote: String },

    #[error("invalid retry policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error type
#[derive(Debug, Error)]
pub enum SteadfastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("Read failed: {0}")]
    Reader(#[from] ReaderError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SteadfastError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // Fatal errors: config, missing objects, permanent backend failures
            SteadfastError::Config(_) => EXIT_FATAL,
            SteadfastError::Backend(err) if !err.is_retriable() => EXIT_FATAL,
            SteadfastError::Reader(ReaderError::Backend(_)) => EXIT_FATAL,
            // Everything else: partial failure
            _ => EXIT_PARTIAL,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            SteadfastError::Config(_) => ErrorCategory::Configuration,
            SteadfastError::Backend(_) => ErrorCategory::Backend,
            SteadfastError::Reader(ReaderError::RetryExhausted { .. }) => ErrorCategory::Retry,
            SteadfastError::Reader(_) => ErrorCategory::Stream,
            SteadfastError::Io(_) => ErrorCategory::IoError,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration errors
    Configuration,
    /// Object store errors
    Backend,
    /// Retry exhaustion
    Retry,
    /// Stream lifecycle errors
    Stream,
    /// Local I/O errors
    IoError,
    /// Errors that never reached the crate's error type
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Backend => write!(f, "backend"),
            ErrorCategory::Retry => write!(f, "retry"),
            ErrorCategory::Stream => write!(f, "stream"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}
