//! Error detail structures for server-reported failures.

use serde_json::Value;

/// Details for a failure reported by the venue.
///
/// Extracted to a separate struct and boxed to keep the `Error` enum small.
///
/// # Example
///
/// ```rust
/// use streamx_core::error::ExchangeErrorDetails;
///
/// let details = ExchangeErrorDetails::new("10006", "too many visits");
/// assert_eq!(details.to_string(), "[10006] too many visits");
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub struct ExchangeErrorDetails {
    /// Venue error code, kept as a string so any code format fits.
    pub code: String,
    /// Message returned by the server.
    pub message: String,
    /// Whether the server asked the caller to back off and retry.
    pub retryable: bool,
    /// Optional raw response data for debugging.
    pub data: Option<Value>,
}

impl ExchangeErrorDetails {
    /// Creates details with the given code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: false,
            data: None,
        }
    }

    /// Creates details with the raw response attached.
    pub fn with_data(code: impl Into<String>, message: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::new(code, message)
        }
    }

    /// Marks the failure as retryable.
    #[must_use]
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl std::fmt::Display for ExchangeErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
