//! Error types for updated.

use thiserror::Error;

/// Failure to retrieve one document from a source.
///
/// Transport and timeout failures are passed through untouched so callers can
/// tell a flaky network apart from a source that moved or went down.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("bad HTTP status code: {code} {status}")]
    BadStatusCode { code: u16, status: String },

    #[error("fetch cancelled")]
    Cancelled,
}

/// Failure to retrieve a checksum-verified trust anchor file.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("checksum does not match: {computed:?} is not expected {expected:?}")]
    ChecksumMismatch { computed: String, expected: String },
}

/// Aggregate outcome of one failed update cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("at least one error encountered: {}", .messages.join("; "))]
pub struct RunError {
    pub messages: Vec<String>,
}
