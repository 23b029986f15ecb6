//! Error types for the disk cache
//!
//! Provides unified error handling using thiserror. A cache miss is not an
//! error: `fetch` reports it as `Ok(None)`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the disk cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Entry exists and is fresh but could not be decompressed or deserialized
    #[error("Corrupt cache entry at {}: {reason}", .path.display())]
    CorruptEntry { path: PathBuf, reason: String },

    /// Directory creation or file read/write failed at the OS level
    #[error("Storage unavailable at {}: {source}", .path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Value handed to `push` cannot be serialized
    #[error("Unsupported value: {0}")]
    UnsupportedValue(#[source] serde_json::Error),

    /// Expiration expression could not be parsed or resolved
    #[error("Invalid expiration policy: {0}")]
    InvalidPolicy(String),

    /// Captured output could not be produced or re-emitted
    #[error("Output capture failed: {0}")]
    Output(#[source] io::Error),
}

impl CacheError {
    /// Wraps an I/O failure together with the path it happened on.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::StorageUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Builds a corruption error for the entry at `path`.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        CacheError::CorruptEntry {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the disk cache.
pub type Result<T> = std::result::Result<T, CacheError>;
