//! Error Types
//!
//! Every fallible engine, codec and snapshot operation returns a [`StoreError`].
//! The variants follow the failure classes the protocol layer cares about:
//!
//! - `NotFound`, `Validation` and `Protocol` are command-local. They are
//!   reported to the client as a single `ERROR` line and the connection stays open.
//! - `Crypto` aborts engine construction, but is only a command error at runtime.
//! - `Io` and `Snapshot` come from dump/restore and are logged by the caller.

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by the storage engine and its collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key is absent or has lazily expired
    #[error("key not found")]
    NotFound,

    /// Malformed command, wrong arity or a non-positive TTL
    #[error("{0}")]
    Validation(String),

    /// Bad key length or ciphertext shorter than the nonce
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Snapshot read/write/rename failure
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Snapshot file is malformed or written by an unknown format version
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Command attempted before authentication, or a bad password
    #[error("{0}")]
    Protocol(String),

    /// A value could not be encoded as JSON
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        StoreError::Crypto(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        StoreError::Protocol(msg.into())
    }

    pub fn snapshot(msg: impl Into<String>) -> Self {
        StoreError::Snapshot(msg.into())
    }

    /// Wraps an I/O error with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        StoreError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns true for the "key not found" case.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(StoreError::NotFound.to_string(), "key not found");
        assert_eq!(
            StoreError::validation("TTL must be positive").to_string(),
            "TTL must be positive"
        );
        assert_eq!(
            StoreError::crypto("bad key").to_string(),
            "crypto error: bad key"
        );

        let err = StoreError::io(
            "failed to open dump file",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.to_string(), "failed to open dump file: missing");
    }

    #[test]
    fn test_is_not_found() {
        assert!(StoreError::NotFound.is_not_found());
        assert!(!StoreError::protocol("nope").is_not_found());
    }
}
