//! Client configuration, built once and never mutated afterwards.

use std::time::Duration;

/// Base URL of the accounts resource when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1/organisation/accounts";

/// Environment variable that overrides the base URL in `ClientConfig::from_env`.
pub const BASE_URL_ENV: &str = "ACCOUNTS_API_URL";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Retry settings for the retrying dispatcher.
///
/// Any zero component turns retries off: the call is dispatched exactly once
/// with no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_interval_ms: u64,
    pub max_jitter_ms: u64,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_interval_ms: u64, max_jitter_ms: u64) -> Self {
        Self {
            max_attempts,
            base_interval_ms,
            max_jitter_ms,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0 && self.base_interval_ms > 0 && self.max_jitter_ms > 0
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(2, 2250, 150)
    }
}

/// Immutable settings for an `AccountClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-attempt timeout. The caller's `CallContext` deadline bounds the
    /// whole call on top of this.
    pub timeout: Option<Duration>,
    pub retries: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            retries: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults, with the base URL taken from `ACCOUNTS_API_URL` when set.
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => config.with_base_url(&url),
            _ => config,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_retries(mut self, retries: RetryConfig) -> Self {
        self.retries = retries;
        self
    }
}
