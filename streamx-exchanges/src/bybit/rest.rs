//! Bybit REST collaborator.
//!
//! The streaming layer only needs three REST calls: funding history pages and
//! the wallet/position snapshots that seed account caches before streaming
//! starts. They sit behind [`BybitRestApi`] so sessions can run against a
//! canned implementation in tests.

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::Value;
use std::collections::BTreeMap;
use streamx_core::config::RetryPolicy;
use streamx_core::credentials::Credentials;
use streamx_core::error::{Error, Result};
use streamx_core::parser_utils::milliseconds;
use streamx_core::types::Category;
use tracing::{debug, instrument, warn};

use super::BybitAuth;
use super::error::check_response;

/// Largest page the funding-history endpoint returns.
pub const FUNDING_PAGE_CAP: i64 = 200;

/// REST calls used by the streaming layer. Every method returns the
/// `result` object of a successful envelope.
#[async_trait]
pub trait BybitRestApi: Send + Sync {
    /// `GET /v5/market/funding/history`.
    async fn funding_history_page(
        &self,
        category: Category,
        market_id: &str,
        start: Option<i64>,
        end: Option<i64>,
        limit: i64,
    ) -> Result<Value>;

    /// `GET /v5/account/wallet-balance` for the unified account.
    async fn wallet_balance(&self, credentials: &Credentials) -> Result<Value>;

    /// `GET /v5/position/list` for one category.
    async fn position_list(&self, credentials: &Credentials, category: Category) -> Result<Value>;
}

/// [`BybitRestApi`] over reqwest.
#[derive(Debug, Clone)]
pub struct HttpBybitRest {
    client: reqwest::Client,
    base_url: String,
    recv_window: u64,
    retry: RetryPolicy,
}

impl HttpBybitRest {
    /// Creates a client for `base_url` (e.g. `https://api.bybit.com`).
    pub fn new(base_url: impl Into<String>, recv_window: u64, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            recv_window,
            retry,
        }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full request URL with form-encoded, key-sorted query parameters.
    fn endpoint(&self, path: &str, params: &BTreeMap<&str, String>) -> Result<Url> {
        Url::parse_with_params(&format!("{}{path}", self.base_url), params)
            .map_err(|e| Error::param_invalid(format!("bad request url for {path}: {e}")))
    }

    async fn get_once(&self, url: &Url, credentials: Option<&Credentials>) -> Result<Value> {
        let mut request = self.client.get(url.clone());
        if let Some(credentials) = credentials {
            let auth = BybitAuth::new(credentials.clone());
            let query = url.query().unwrap_or("");
            let mut headers =
                auth.create_auth_headers(&milliseconds().to_string(), self.recv_window, query)?;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            request = request.headers(headers);
        }
        debug!("Bybit request: GET {}", url);
        let response: Value = request.send().await?.json().await?;
        check_response(&response).cloned()
    }

    /// Sends a GET, retrying retryable failures per the retry policy.
    async fn get(
        &self,
        path: &str,
        params: &BTreeMap<&str, String>,
        credentials: Option<&Credentials>,
    ) -> Result<Value> {
        let url = self.endpoint(path, params)?;
        let mut attempt = 0;
        loop {
            match self.get_once(&url, credentials).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(path, attempt, error = %e, "retrying Bybit request");
                    tokio::time::sleep(e.retry_after().unwrap_or(self.retry.delay)).await;
                }
                Err(e) => return Err(e.context(format!("GET {path}"))),
            }
        }
    }
}

#[async_trait]
impl BybitRestApi for HttpBybitRest {
    #[instrument(skip(self), level = "debug")]
    async fn funding_history_page(
        &self,
        category: Category,
        market_id: &str,
        start: Option<i64>,
        end: Option<i64>,
        limit: i64,
    ) -> Result<Value> {
        let mut params = BTreeMap::new();
        params.insert("category", category.as_str().to_string());
        params.insert("symbol", market_id.to_string());
        params.insert("limit", limit.to_string());
        if let Some(start) = start {
            params.insert("startTime", start.to_string());
        }
        if let Some(end) = end {
            params.insert("endTime", end.to_string());
        }
        self.get("/v5/market/funding/history", &params, None).await
    }

    #[instrument(skip_all, level = "debug")]
    async fn wallet_balance(&self, credentials: &Credentials) -> Result<Value> {
        if !credentials.is_complete() {
            return Err(Error::authentication("API key and secret are required"));
        }
        let mut params = BTreeMap::new();
        params.insert("accountType", "UNIFIED".to_string());
        self.get("/v5/account/wallet-balance", &params, Some(credentials))
            .await
    }

    #[instrument(skip(self, credentials), level = "debug")]
    async fn position_list(&self, credentials: &Credentials, category: Category) -> Result<Value> {
        if !credentials.is_complete() {
            return Err(Error::authentication("API key and secret are required"));
        }
        let mut params = BTreeMap::new();
        params.insert("category", category.as_str().to_string());
        if category == Category::Linear {
            params.insert("settleCoin", "USDT".to_string());
        }
        self.get("/v5/position/list", &params, Some(credentials))
            .await
    }
}
