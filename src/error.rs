//! Errors for the event catalog fetch path.

use thiserror::Error;

/// Failure reported by a remote event catalog.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Network hiccup; retrying later may succeed
    #[error("event catalog request failed: {0}")]
    Transient(String),
}

impl FeedError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    /// Live fetch failed and there was no cached list to fall back to
    #[error("events unavailable, try again")]
    FetchUnavailable(#[source] FeedError),

    /// Event list could not be encoded for the session store
    #[error("failed to encode event cache: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Session file could not be read or written.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
