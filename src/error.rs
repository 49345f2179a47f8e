//! Error types shared by both indexes.
//!
//! Every fallible operation returns [`Error`]. The variants are descriptive,
//! and [`Error::kind`] projects them onto the closed status taxonomy callers
//! branch on: invalid argument, not found, or structural failure.

use std::fmt;

use thiserror::Error;

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A handle, key, or name argument is unusable.
    InvalidArgument,
    /// The key is not stored in the index.
    NotFound,
    /// A structural precondition was violated.
    Fail,
}

/// Errors that can occur in index operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The handle does not resolve to a live record.
    #[error("handle does not refer to a live record")]
    InvalidHandle,

    /// The record is already linked into this index.
    #[error("record is already linked into the index")]
    AlreadyLinked,

    /// The record is not linked into this index.
    #[error("record is not linked into the index")]
    NotLinked,

    /// Container name exceeds the configured limit.
    #[error("name too long: {len} bytes (max: {max})")]
    NameTooLong {
        /// Actual length of the name.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Key exceeds the configured limit.
    #[error("key too long: {len} bytes (max: {max})")]
    KeyTooLong {
        /// Actual length of the key.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Key contains the end-of-key sentinel byte.
    #[error("key contains the sentinel byte at position {position}")]
    SentinelInKey {
        /// Offset of the first sentinel byte.
        position: usize,
    },

    /// Key not found in the index.
    #[error("key not found")]
    KeyNotFound,

    /// An entry with the same key is already stored.
    #[error("duplicate key")]
    DuplicateKey,

    /// The container still holds entries.
    #[error("index {name:?} is not empty: {count} entries remain")]
    NotEmpty {
        /// Name of the container.
        name: String,
        /// Number of entries still linked.
        count: usize,
    },

    /// Node storage could not be grown.
    #[error("node allocation failed")]
    AllocationFailed,
}

impl Error {
    /// Returns the status class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidHandle
            | Error::AlreadyLinked
            | Error::NotLinked
            | Error::NameTooLong { .. }
            | Error::KeyTooLong { .. }
            | Error::SentinelInKey { .. } => ErrorKind::InvalidArgument,
            Error::KeyNotFound => ErrorKind::NotFound,
            Error::DuplicateKey | Error::NotEmpty { .. } | Error::AllocationFailed => {
                ErrorKind::Fail
            }
        }
    }
}

/// Returned by `destroy` when the container is not empty.
///
/// The container is handed back untouched.
pub struct DestroyError<C> {
    error: Error,
    container: C,
}

impl<C> DestroyError<C> {
    pub(crate) fn new(error: Error, container: C) -> Self {
        Self { error, container }
    }

    /// The reason the container could not be destroyed.
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Recovers the container.
    pub fn into_inner(self) -> C {
        self.container
    }
}

impl<C> fmt::Debug for DestroyError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<C> fmt::Display for DestroyError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot destroy index: {}", self.error)
    }
}

impl<C> std::error::Error for DestroyError<C> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
