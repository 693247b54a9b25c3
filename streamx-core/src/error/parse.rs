//! Parsing-related error types.

use std::borrow::Cow;
use thiserror::Error;

/// Errors raised while decoding venue payloads.
///
/// ```rust
/// use streamx_core::error::ParseError;
///
/// let err = ParseError::missing_field("fundingRateTimestamp");
/// assert!(err.to_string().contains("fundingRateTimestamp"));
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// Failed to parse a decimal number.
    #[error("Failed to parse decimal: {0}")]
    Decimal(#[from] rust_decimal::Error),

    /// Failed to deserialize JSON.
    #[error("Failed to deserialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing required field in a payload.
    #[error("Missing required field: {0}")]
    MissingField(Cow<'static, str>),

    /// Field present but holding an unusable value.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        /// Field name
        field: Cow<'static, str>,
        /// Error message
        message: Cow<'static, str>,
    },
}

impl ParseError {
    /// Creates a `MissingField` error.
    #[must_use]
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField(Cow::Borrowed(field))
    }

    /// Creates an `InvalidValue` error.
    pub fn invalid_value(
        field: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
