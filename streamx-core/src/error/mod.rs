//! # Error Handling for streamx
//!
//! Every fallible operation in the workspace returns [`Result<T>`], whose error
//! type is the single [`Error`] enum defined here. Venue-specific failure codes
//! are folded into this taxonomy at the edge (see the Bybit `retCode` mapping in
//! `streamx-exchanges`), so callers only ever match on one type.
//!
//! ## Error Hierarchy
//!
//! ```text
//! Error
//! ├── ParamInvalid      - caller supplied a bad symbol, timeframe or mix of markets
//! ├── ParamRequired     - a required argument was missing
//! ├── NotSupported      - operation not valid for this category
//! ├── UnsupportedMarket - market type cannot carry the requested stream
//! ├── Timeout           - login or request did not resolve in time
//! ├── Runtime           - transport/protocol failure (no connection, op failed)
//! ├── SignFail          - request signing failed
//! ├── Authentication    - credentials rejected or expired
//! ├── Exchange          - server error code with the server's message
//! ├── Network           - HTTP transport errors (via NetworkError)
//! ├── Parse             - payload decoding errors (via ParseError)
//! └── Context           - error with additional context
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use streamx_core::error::{Error, Result};
//!
//! fn depth_for(limit: i64) -> Result<u32> {
//!     if limit > 10_000 {
//!         return Err(Error::param_invalid("depth limit too large"));
//!     }
//!     Ok(50)
//! }
//! ```
//!
//! ### Adding Context to Errors
//!
//! ```rust
//! use streamx_core::error::{Error, Result, ContextExt};
//!
//! fn subscribe(topic: &str) -> Result<()> {
//!     write_frame(topic).with_context(|| format!("subscribe {topic}"))?;
//!     Ok(())
//! }
//! # fn write_frame(_: &str) -> Result<()> { Ok(()) }
//! ```
//!
//! ## Memory Layout
//!
//! Large variants (`Exchange`, `Network`, `Parse`, `Context`) are boxed and
//! string payloads use `Cow<'static, str>`, so static messages never allocate.

mod context;
mod convert;
mod details;
mod network;
mod parse;

use std::borrow::Cow;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

pub use context::ContextExt;
pub use details::ExchangeErrorDetails;
pub use network::NetworkError;
pub use parse::ParseError;

/// Result type alias for all streamx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type for streamx.
///
/// # Example
///
/// ```rust
/// use streamx_core::error::Error;
///
/// let err = Error::timeout("ws login timeout");
/// assert!(err.to_string().contains("ws login timeout"));
/// assert!(err.is_retryable());
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Caller misuse: malformed symbol, unknown timeframe, mixed categories.
    #[error("Invalid parameter: {0}")]
    ParamInvalid(Cow<'static, str>),

    /// A required argument was absent.
    #[error("Missing parameter: {0}")]
    ParamRequired(Cow<'static, str>),

    /// The operation is not available for this market category.
    #[error("Not supported: {0}")]
    NotSupported(Cow<'static, str>),

    /// The market type cannot carry the requested stream.
    #[error("Unsupported market: {0}")]
    UnsupportedMarket(Cow<'static, str>),

    /// Operation did not complete before its deadline.
    #[error("Timeout: {0}")]
    Timeout(Cow<'static, str>),

    /// Transport or protocol level failure.
    #[error("Runtime error: {0}")]
    Runtime(Cow<'static, str>),

    /// Computing a request signature failed.
    #[error("Signing failed: {0}")]
    SignFail(Cow<'static, str>),

    /// Credentials were rejected, expired or lack permission.
    #[error("Authentication error: {0}")]
    Authentication(Cow<'static, str>),

    /// Server-reported failure carrying the venue code and message.
    /// Boxed to reduce enum size.
    #[error("Exchange error: {0}")]
    Exchange(Box<ExchangeErrorDetails>),

    /// HTTP transport errors. Boxed to reduce enum size.
    #[error("Network error: {0}")]
    Network(Box<NetworkError>),

    /// Payload decoding errors. Boxed to reduce enum size.
    #[error("Parse error: {0}")]
    Parse(Box<ParseError>),

    /// Error with additional context, preserving the error chain.
    #[error("{context}")]
    Context {
        /// Context message describing what operation failed
        context: String,
        /// The underlying error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    // ==================== Constructor Methods ====================

    /// Creates a `ParamInvalid` error.
    pub fn param_invalid(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::ParamInvalid(msg.into())
    }

    /// Creates a `ParamRequired` error.
    pub fn param_required(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::ParamRequired(msg.into())
    }

    /// Creates a `NotSupported` error.
    pub fn not_supported(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Creates an `UnsupportedMarket` error.
    pub fn unsupported_market(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedMarket(msg.into())
    }

    /// Creates a `Timeout` error.
    pub fn timeout(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a `Runtime` error.
    pub fn runtime(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates a `SignFail` error.
    pub fn sign_fail(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::SignFail(msg.into())
    }

    /// Creates an `Authentication` error.
    pub fn authentication(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Creates a server-reported error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use streamx_core::error::Error;
    ///
    /// let err = Error::exchange("10016", "server error");
    /// assert_eq!(err.as_exchange().map(|d| d.code.as_str()), Some("10016"));
    /// ```
    pub fn exchange(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Exchange(Box::new(ExchangeErrorDetails::new(code, message)))
    }

    /// Creates a server-reported error that callers may retry after a pause.
    pub fn exchange_busy(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Exchange(Box::new(
            ExchangeErrorDetails::new(code, message).retryable(true),
        ))
    }

    /// Creates a server-reported error with the raw response attached.
    pub fn exchange_with_data(
        code: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self::Exchange(Box::new(ExchangeErrorDetails::with_data(
            code, message, data,
        )))
    }

    /// Creates a network error from a message.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(Box::new(NetworkError::ConnectionFailed(msg.into())))
    }

    // ==================== Context Methods ====================

    /// Attaches context to an existing error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use streamx_core::error::Error;
    ///
    /// let err = Error::runtime("get ws conn fail").context("subscribe orderbook.50.BTCUSDT");
    /// assert!(err.report().contains("get ws conn fail"));
    /// ```
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    // ==================== Chain Traversal Methods ====================

    fn iter_chain(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |err| match err {
            Error::Context { source, .. } => Some(source.as_ref()),
            _ => None,
        })
    }

    /// Returns the root cause of the error, skipping Context layers.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        self.iter_chain().last().unwrap_or(self)
    }

    /// Generates a detailed error report with the full chain.
    #[must_use]
    pub fn report(&self) -> String {
        use std::fmt::Write;
        let mut report = self.to_string();
        let mut current: Option<&(dyn StdError + 'static)> = self.source();
        while let Some(err) = current {
            let _ = write!(report, "\nCaused by: {err}");
            current = err.source();
        }
        report
    }

    // ==================== Helper Methods (Context Penetrating) ====================

    /// Checks if this error is worth retrying.
    ///
    /// Returns `true` for network timeouts and connection failures, `Timeout`,
    /// and server errors flagged as busy.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.root_cause() {
            Error::Network(ne) => matches!(
                ne.as_ref(),
                NetworkError::Timeout | NetworkError::ConnectionFailed(_)
            ),
            Error::Timeout(_) => true,
            Error::Exchange(details) => details.retryable,
            _ => false,
        }
    }

    /// Suggested pause before a retry, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self.root_cause() {
            Error::Exchange(details) if details.retryable => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    /// Returns the server error details (penetrates Context layers).
    #[must_use]
    pub fn as_exchange(&self) -> Option<&ExchangeErrorDetails> {
        match self.root_cause() {
            Error::Exchange(details) => Some(details),
            _ => None,
        }
    }

    /// Returns the authentication message (penetrates Context layers).
    #[must_use]
    pub fn as_authentication(&self) -> Option<&str> {
        match self.root_cause() {
            Error::Authentication(msg) => Some(msg.as_ref()),
            _ => None,
        }
    }

    /// Checks whether the root cause is a `Timeout`.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Error::Timeout(_))
    }
}
