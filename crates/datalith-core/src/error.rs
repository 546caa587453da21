use std::fmt;
use thiserror::Error as ThisError;

///
/// CoreError
///
/// Structured runtime error with a stable internal classification.
/// Query-level mismatches are never errors; they surface as empty relations.
///

#[derive(Debug, ThisError)]
#[error("{kind}: {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// KV engine I/O, corruption, or snapshot failure. Bubbles up; no retry.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Malformed key or value bytes. Treated as corruption: the offending
    /// scan terminates; neighboring scans proceed.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    /// Invalid construction parameter. Raised at construction only.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Use-after-close of a transaction or iterator.
    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClosedResource, message)
    }

    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self.kind, ErrorKind::Storage)
    }

    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self.kind, ErrorKind::Decode)
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::ClosedResource)
    }
}

///
/// ErrorKind
///
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Storage,
    Decode,
    Config,
    ClosedResource,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Storage => "storage",
            Self::Decode => "decode",
            Self::Config => "config",
            Self::ClosedResource => "closed_resource",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
