//! Account credentials with automatic memory zeroization.
//!
//! Secrets live in [`SecretString`], which zeroes its buffer on drop and never
//! prints its content through `Debug` or `Display`.
//!
//! ```rust
//! use streamx_core::credentials::Credentials;
//!
//! let creds = Credentials::new("key", "secret");
//! assert_eq!(creds.api_key.expose_secret(), "key");
//! assert_eq!(format!("{creds:?}").matches("[REDACTED]").count(), 2);
//! ```

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string that is zeroed when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value. Use it immediately; do not store it.
    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns the secret as bytes.
    #[inline]
    pub fn expose_secret_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns true if the secret is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// API key pair of one trading account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    /// Public API key.
    pub api_key: SecretString,
    /// Signing secret.
    pub secret: SecretString,
}

impl Credentials {
    /// Creates a key pair.
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            secret: SecretString::new(secret),
        }
    }

    /// Reads a key pair from two environment variables, loading `.env` first.
    ///
    /// Returns `None` when either variable is missing or empty.
    pub fn from_env(key_var: &str, secret_var: &str) -> Option<Self> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var(key_var).ok().filter(|v| !v.is_empty())?;
        let secret = std::env::var(secret_var).ok().filter(|v| !v.is_empty())?;
        Some(Self::new(api_key, secret))
    }

    /// Returns true when both halves are set.
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_redacted() {
        let secret = SecretString::new("super-secret");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(secret.expose_secret(), "super-secret");
    }

    #[test]
    fn test_credentials_complete() {
        assert!(Credentials::new("k", "s").is_complete());
        assert!(!Credentials::new("k", "").is_complete());
    }

    #[test]
    fn test_from_env_missing() {
        assert!(Credentials::from_env("STREAMX_TEST_NO_SUCH_KEY", "STREAMX_TEST_NO_SUCH_SECRET").is_none());
    }
}
