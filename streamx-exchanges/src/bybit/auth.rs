//! Bybit request signing.
//!
//! REST requests carry four headers:
//! - X-BAPI-API-KEY: API key
//! - X-BAPI-SIGN: hex HMAC-SHA256 of `timestamp + api_key + recv_window + query`
//! - X-BAPI-TIMESTAMP: Unix timestamp in milliseconds
//! - X-BAPI-RECV-WINDOW: receive window in milliseconds
//!
//! The private stream logs in with `{"op":"auth","args":[key, expires, sign]}`
//! where `sign` is the hex HMAC-SHA256 of `"GET/realtime" + expires`.

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use sha2::Sha256;
use streamx_core::credentials::Credentials;
use streamx_core::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Bybit API authenticator.
///
/// Credentials are zeroed from memory when dropped.
#[derive(Debug, Clone)]
pub struct BybitAuth {
    credentials: Credentials,
}

impl BybitAuth {
    /// Creates an authenticator for one account.
    ///
    /// ```
    /// use streamx_core::credentials::Credentials;
    /// use streamx_exchanges::bybit::BybitAuth;
    ///
    /// let auth = BybitAuth::new(Credentials::new("key", "secret"));
    /// assert_eq!(auth.api_key(), "key");
    /// ```
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Returns the API key.
    pub fn api_key(&self) -> &str {
        self.credentials.api_key.expose_secret()
    }

    /// Builds the REST signature string: `timestamp + api_key + recv_window + params`.
    pub fn build_sign_string(&self, timestamp: &str, recv_window: u64, params: &str) -> String {
        format!("{timestamp}{}{recv_window}{params}", self.api_key())
    }

    /// Signs a REST request.
    pub fn sign(&self, timestamp: &str, recv_window: u64, params: &str) -> Result<String> {
        self.hmac_sha256_hex(&self.build_sign_string(timestamp, recv_window, params))
    }

    /// Builds the websocket login frame for a request expiring at `expires`
    /// (milliseconds since the epoch).
    ///
    /// ```
    /// use streamx_core::credentials::Credentials;
    /// use streamx_exchanges::bybit::BybitAuth;
    ///
    /// let auth = BybitAuth::new(Credentials::new("key", "secret"));
    /// let frame = auth.ws_auth_frame(1_700_000_010_000).unwrap();
    /// assert_eq!(frame["op"], "auth");
    /// assert_eq!(frame["args"][1], 1_700_000_010_000i64);
    /// ```
    pub fn ws_auth_frame(&self, expires: i64) -> Result<Value> {
        let sign = self.hmac_sha256_hex(&format!("GET/realtime{expires}"))?;
        Ok(json!({
            "op": "auth",
            "args": [self.api_key(), expires, sign],
        }))
    }

    fn hmac_sha256_hex(&self, message: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret.expose_secret_bytes())
            .map_err(|e| Error::sign_fail(format!("hmac key rejected: {e}")))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Signs `params` and returns the four authentication headers.
    pub fn create_auth_headers(
        &self,
        timestamp: &str,
        recv_window: u64,
        params: &str,
    ) -> Result<HeaderMap> {
        let sign = self.sign(timestamp, recv_window, params)?;
        let mut headers = HeaderMap::new();
        let pairs = [
            ("X-BAPI-API-KEY", self.api_key().to_string()),
            ("X-BAPI-SIGN", sign),
            ("X-BAPI-TIMESTAMP", timestamp.to_string()),
            ("X-BAPI-RECV-WINDOW", recv_window.to_string()),
        ];
        for (name, value) in pairs {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| Error::sign_fail(format!("invalid {name} header: {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}
