//! Error taxonomy for the guard layer.
//!
//! Expected outcomes (rate limited, gate locked, backend not configured) are
//! return values, not errors. What remains here are real failures of the
//! storage medium, the push feed or a side effect.

use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage I/O failed for {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage file {path} is not a JSON object: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize storage: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("alert feed read failed: {0}")]
    Feed(#[source] std::io::Error),
    #[error("alert feed subscribe failed: {0}")]
    Subscribe(String),
    #[error("audio playback failed: {0}")]
    Audio(String),
}
