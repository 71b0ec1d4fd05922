//! Error types for the storage layer.

use std::path::PathBuf;

/// Errors that can occur while reading or writing flight records.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored record exists but could not be parsed.
    #[error("corrupt record {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be serialized.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The backing store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
