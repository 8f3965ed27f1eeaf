//! Error types for manor-backend.

use thiserror::Error;

/// Errors from talking to the hosted backend.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// The backend is not reachable.
    #[error("Backend not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The backend returned an error response.
    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Result type alias using manor-backend's error type.
pub type Result<T> = std::result::Result<T, BackendError>;
