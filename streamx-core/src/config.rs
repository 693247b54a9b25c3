//! Configuration types shared by streaming sessions and REST collaborators.

use std::time::Duration;

/// Default keepalive ping interval for every physical connection.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(20);

/// Default deadline for a websocket login round-trip.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default validity window of a signed auth request, in milliseconds.
pub const DEFAULT_AUTH_EXPIRY_MS: i64 = 10_000;

/// Default capacity of each output queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Retry policy for REST requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Tunables of a streaming session.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use streamx_core::config::StreamConfig;
///
/// let config = StreamConfig {
///     login_timeout: Duration::from_secs(5),
///     ..Default::default()
/// };
/// assert_eq!(config.ping_interval, Duration::from_secs(20));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Interval between keepalive pings on each connection.
    pub ping_interval: Duration,
    /// How long a login may stay unresolved before it fails.
    pub login_timeout: Duration,
    /// How far ahead of "now" the signed auth request expires, in milliseconds.
    pub auth_expiry_ms: i64,
    /// Capacity of each output queue; slow consumers lose the oldest items.
    pub queue_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            auth_expiry_ms: DEFAULT_AUTH_EXPIRY_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
