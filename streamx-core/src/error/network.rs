//! Network-related error types.

use std::error::Error as StdError;
use thiserror::Error;

/// HTTP transport errors, hiding `reqwest` from the public API.
///
/// [`NetworkError::Timeout`] and [`NetworkError::ConnectionFailed`] are
/// considered retryable by [`crate::Error::is_retryable`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NetworkError {
    /// Request failed with an HTTP status code.
    #[error("Request failed with status {status}: {message}")]
    RequestFailed {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Request timed out.
    #[error("Request timeout")]
    Timeout,

    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Opaque transport error for everything else.
    #[error("Transport error")]
    Transport(#[source] Box<dyn StdError + Send + Sync + 'static>),
}
