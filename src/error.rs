//! Error types surfaced to callers.
//!
//! Upstream trouble never shows up here: the fetch layer turns it into
//! absence. Only local failures (persisting state) are errors.

use std::path::PathBuf;

use thiserror::Error;

/// A single failed attempt against the marketplace. Always retried, never surfaced.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("upstream reported success=false")]
    Unsuccessful,
}

/// A watch list mutation was rejected or could not be written to disk.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("price must be a finite, non-negative number, got {0}")]
    InvalidPrice(f64),
    #[error("failed to write watch list to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize watch list: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("scan history unavailable: {0:#}")]
    History(anyhow::Error),
}
