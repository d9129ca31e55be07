use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy for the ingestion pipeline.
///
/// Per-item parse filtering and duplicate ingestion are deliberately absent:
/// dropped feed items are a silent filter, and a duplicate article returns the
/// existing record with `was_new = false`.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed URL or other bad input, rejected before anything persists.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The outbound network guard refused the target.
    #[error("blocked network target: {0}")]
    BlockedNetwork(String),

    /// robots.txt disallows fetching this URL.
    #[error("robots.txt disallows {0}")]
    RobotsDisallowed(String),

    /// The request did not complete within the bounded timeout.
    #[error("request timed out after {0:?}")]
    FetchTimeout(Duration),

    /// The origin answered with a non-success status.
    #[error("fetch failed with HTTP status {0}")]
    FetchFailed(u16),

    /// Transport-level failure (connect, TLS, body read).
    #[error("fetch failed: {0}")]
    FetchError(String),

    /// The fetched document could not be parsed at all.
    #[error("parse failed: {0}")]
    ParseFailed(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
