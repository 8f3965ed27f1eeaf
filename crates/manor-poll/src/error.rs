//! Error types for manor-poll.

use thiserror::Error;

/// Boxed error type carried by refresh and submission outcomes.
///
/// The poller does not interpret refresh errors beyond logging them and
/// counting the failure, so callers may return any error type that converts
/// into this alias.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the polling utilities themselves.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Poller or policy options failed validation.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// Result type alias using manor-poll's error type.
pub type Result<T> = std::result::Result<T, Error>;
