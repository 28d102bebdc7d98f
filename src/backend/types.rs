//! Common types for the remote object capability

use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use super::error::{BackendError, BackendResult};

/// Chunked async byte stream, the shape most storage SDKs hand back
pub type ReadStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Free-form object metadata (keys are backend specific, e.g. "mtime")
pub type ObjectMetadata = HashMap<String, String>;

/// Byte range in HTTP `Range` header semantics
///
/// `end` is inclusive. A missing `start` with a present `end` requests the
/// last `end` bytes of the object (a suffix range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeSpec {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl RangeSpec {
    /// Inclusive range `[start, end]`
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// From `start` to the end of the object
    pub fn from_start(start: u64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// The last `len` bytes of the object
    pub fn suffix(len: u64) -> Self {
        Self {
            start: None,
            end: Some(len),
        }
    }

    /// Decode into `(offset, limit)` against an object of `size` bytes
    ///
    /// `limit` is an exclusive absolute bound, `None` meaning "to the end".
    pub fn decode(&self, size: u64) -> (u64, Option<u64>) {
        match (self.start, self.end) {
            (Some(start), Some(end)) => (start, Some(end.saturating_add(1))),
            (Some(start), None) => (start, None),
            (None, Some(len)) => (size.saturating_sub(len), None),
            (None, None) => (0, None),
        }
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(start), Some(end)) => write!(f, "bytes={}-{}", start, end),
            (Some(start), None) => write!(f, "bytes={}-", start),
            (None, Some(len)) => write!(f, "bytes=-{}", len),
            (None, None) => write!(f, "bytes=0-"),
        }
    }
}

impl FromStr for RangeSpec {
    type Err = String;

    /// Parses `a-b`, `a-` and `-n`, optionally prefixed with `bytes=`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        let spec = spec.strip_prefix("bytes=").unwrap_or(spec);
        let (start, end) = spec
            .split_once('-')
            .ok_or_else(|| format!("invalid range '{}': expected START-END", s))?;

        let parse = |part: &str| -> Result<Option<u64>, String> {
            if part.is_empty() {
                Ok(None)
            } else {
                part.parse::<u64>()
                    .map(Some)
                    .map_err(|e| format!("invalid range '{}': {}", s, e))
            }
        };

        let range = RangeSpec {
            start: parse(start)?,
            end: parse(end)?,
        };

        match (range.start, range.end) {
            (None, None) => Err(format!("invalid range '{}': empty", s)),
            (Some(a), Some(b)) if b < a => {
                Err(format!("invalid range '{}': end before start", s))
            }
            _ => Ok(range),
        }
    }
}

/// Directive passed along with an open request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOption {
    /// Start reading at byte `offset`, continue to the end
    Seek { offset: u64 },

    /// Read only the bytes in the range
    Range(RangeSpec),

    /// Extra request header for HTTP-based stores
    Header { key: String, value: String },

    /// Opaque backend-specific directive
    Other(String),
}

impl OpenOption {
    pub fn header(key: impl Into<String>, value: impl Into<String>) -> Self {
        OpenOption::Header {
            key: key.into(),
            value: value.into(),
        }
    }

    /// True for seek and range directives
    pub fn is_positional(&self) -> bool {
        matches!(self, OpenOption::Seek { .. } | OpenOption::Range(_))
    }
}

impl fmt::Display for OpenOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenOption::Seek { offset } => write!(f, "seek={}", offset),
            OpenOption::Range(range) => write!(f, "range={}", range),
            OpenOption::Header { key, value } => write!(f, "{}: {}", key, value),
            OpenOption::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Checksum algorithms objects may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKind {
    Sha256,
    Blake3,
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKind::Sha256 => write!(f, "sha256"),
            HashKind::Blake3 => write!(f, "blake3"),
        }
    }
}

impl FromStr for HashKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashKind::Sha256),
            "blake3" => Ok(HashKind::Blake3),
            other => Err(format!("unknown hash type '{}'", other)),
        }
    }
}

/// Incremental hasher over the supported algorithms
pub(crate) enum Hasher {
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    pub(crate) fn new(kind: HashKind) -> Self {
        use sha2::Digest;
        match kind {
            HashKind::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            HashKind::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub(crate) fn finish_hex(self) -> String {
        use sha2::Digest;
        match self {
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Resolve open directives into the half-open window `[start, end)` a store serves
///
/// Later directives override earlier ones. A window starting past the end of
/// the object is unsatisfiable; one starting exactly at the end is empty.
pub fn requested_window(
    remote: &str,
    options: &[OpenOption],
    size: u64,
) -> BackendResult<(u64, u64)> {
    let mut start = 0;
    let mut end = size;

    for option in options {
        match option {
            OpenOption::Seek { offset } => {
                start = *offset;
                end = size;
            }
            OpenOption::Range(range) => {
                let (offset, limit) = range.decode(size);
                start = offset;
                end = limit.map_or(size, |limit| limit.min(size));
            }
            OpenOption::Header { .. } | OpenOption::Other(_) => {}
        }
    }

    if start > size {
        return Err(BackendError::InvalidRange {
            remote: remote.to_string(),
            message: format!("start {} beyond size {}", start, size),
        });
    }

    Ok((start, end.max(start)))
}
