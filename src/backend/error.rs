//! Error types for the remote object capability
//!
//! This module covers failures reported by object stores when opening or
//! reading a remote object, and classifies them as retriable (transient) or
//! permanent.

use std::fmt;
use std::io;

/// Result type alias for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Unified error type for backend operations
#[derive(Debug)]
pub enum BackendError {
    /// I/O error occurred during backend operation
    Io(io::Error),

    /// Object not found on backend
    NotFound { remote: String, backend: String },

    /// Permission denied accessing the object
    PermissionDenied { remote: String, message: String },

    /// Connection failed to remote backend
    ConnectionFailed {
        backend: String,
        endpoint: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out
    Timeout {
        operation: String,
        duration_secs: u64,
    },

    /// Network error during remote operation
    Network {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Requested byte range cannot be satisfied
    InvalidRange { remote: String, message: String },

    /// Backend operation not supported
    Unsupported { backend: String, operation: String },

    /// Stream handle was used after it was closed
    StreamClosed { remote: String },

    /// Generic backend error with context
    Other { backend: String, message: String },
}

impl BackendError {
    /// Shorthand for a network failure without an underlying source
    pub fn network(message: impl Into<String>) -> Self {
        BackendError::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Check if this error is retriable (transient)
    pub fn is_retriable(&self) -> bool {
        match self {
            // Retriable errors - typically network or temporary issues
            BackendError::Timeout { .. } => true,
            BackendError::ConnectionFailed { .. } => true,
            BackendError::Network { .. } => true,
            BackendError::Io(e) => {
                matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut
                        | io::ErrorKind::Interrupted
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::ConnectionRefused
                        | io::ErrorKind::BrokenPipe
                        | io::ErrorKind::UnexpectedEof
                )
            }

            // Non-retriable errors
            BackendError::NotFound { .. } => false,
            BackendError::PermissionDenied { .. } => false,
            BackendError::InvalidRange { .. } => false,
            BackendError::Unsupported { .. } => false,
            BackendError::StreamClosed { .. } => false,
            BackendError::Other { .. } => false,
        }
    }

    /// Check if this error indicates the object was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Io(err) => write!(f, "I/O error: {}", err),
            BackendError::NotFound { remote, backend } => {
                write!(f, "Object not found on {}: {}", backend, remote)
            }
            BackendError::PermissionDenied { remote, message } => {
                write!(f, "Permission denied for {}: {}", remote, message)
            }
            BackendError::ConnectionFailed {
                backend,
                endpoint,
                source,
            } => {
                if let Some(src) = source {
                    write!(
                        f,
                        "Connection to {} ({}) failed: {}",
                        backend, endpoint, src
                    )
                } else {
                    write!(f, "Connection to {} ({}) failed", backend, endpoint)
                }
            }
            BackendError::Timeout {
                operation,
                duration_secs,
            } => {
                write!(
                    f,
                    "Operation '{}' timed out after {} seconds",
                    operation, duration_secs
                )
            }
            BackendError::Network { message, source } => {
                if let Some(src) = source {
                    write!(f, "Network error: {} ({})", message, src)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            BackendError::InvalidRange { remote, message } => {
                write!(f, "Invalid range for {}: {}", remote, message)
            }
            BackendError::Unsupported { backend, operation } => {
                write!(
                    f,
                    "Operation '{}' not supported by backend {}",
                    operation, backend
                )
            }
            BackendError::StreamClosed { remote } => {
                write!(f, "Stream for {} is already closed", remote)
            }
            BackendError::Other { backend, message } => {
                write!(f, "Backend error on {}: {}", backend, message)
            }
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Io(err) => Some(err),
            BackendError::ConnectionFailed {
                source: Some(src), ..
            }
            | BackendError::Network {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for BackendError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => BackendError::NotFound {
                remote: String::new(),
                backend: "unknown".to_string(),
            },
            io::ErrorKind::PermissionDenied => BackendError::PermissionDenied {
                remote: String::new(),
                message: err.to_string(),
            },
            _ => BackendError::Io(err),
        }
    }
}

/// Failure of a single read on an open stream handle
///
/// `transferred` is the number of bytes the handle placed at the front of
/// the caller's buffer before the failure. Those bytes are valid data.
#[derive(Debug)]
pub struct StreamError {
    pub transferred: usize,
    pub source: BackendError,
}

impl StreamError {
    pub fn new(transferred: usize, source: BackendError) -> Self {
        Self {
            transferred,
            source,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.transferred > 0 {
            write!(
                f,
                "read failed after {} bytes: {}",
                self.transferred, self.source
            )
        } else {
            write!(f, "read failed: {}", self.source)
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<BackendError> for StreamError {
    fn from(err: BackendError) -> Self {
        StreamError::new(0, err)
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        StreamError::new(0, BackendError::from(err))
    }
}
