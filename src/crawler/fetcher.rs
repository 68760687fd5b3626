//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client
//! - Assembling a fresh header set per request with a rotated user agent
//! - Single GET attempts bounded by a per-attempt timeout
//! - A standalone retry stage with a fixed backoff
//! - Error classification
//!
//! The stages compose as `fetch = with_retry(fetch_once)`; each one can be
//! exercised on its own.

use crate::config::FetcherConfig;
use crate::{ConfigError, CrawlError};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Reason a single fetch attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Failed to read body from {url}: {message}")]
    Body { url: String, message: String },
}

/// How many times to retry and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub retry_times: u32,

    /// Fixed pause between two attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retry_times: u32, backoff: Duration) -> Self {
        Self {
            retry_times,
            backoff,
        }
    }

    /// Total number of attempts, the first one included
    pub fn max_attempts(&self) -> u32 {
        self.retry_times.saturating_add(1)
    }
}

impl From<&FetcherConfig> for RetryPolicy {
    fn from(config: &FetcherConfig) -> Self {
        Self::new(config.retry_times, config.retry_backoff())
    }
}

/// An outcome together with the number of attempts it took
///
/// Used for both sides of a retried operation, so an exhausted retry budget
/// is an ordinary return value rather than a propagated error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempts<T> {
    pub value: T,
    pub attempts: u32,
}

impl<T> Attempts<T> {
    /// Number of attempts beyond the first
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Page body fetched successfully
pub type Fetched = Attempts<String>;

/// Last error after the retry budget was exhausted
pub type FetchFailure = Attempts<FetchError>;

/// Runs `op` until it succeeds or the policy runs out of attempts
///
/// `op` receives the 1-based attempt number. The backoff is slept between
/// attempts, never after the last one.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<Attempts<T>, Attempts<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => {
                return Ok(Attempts {
                    value,
                    attempts: attempt,
                })
            }
            Err(error) if attempt >= max_attempts => {
                tracing::warn!(attempt, max_attempts, error = %error, "Retry budget exhausted");
                return Err(Attempts {
                    value: error,
                    attempts: attempt,
                });
            }
            Err(error) => {
                tracing::warn!(
                    attempt,
                    remaining = max_attempts - attempt,
                    error = %error,
                    "Attempt failed, retrying"
                );
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }
}

/// Builds the HTTP client shared by every request
///
/// No default user agent is set: each request carries its own.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages with per-request headers, timeout and retry
///
/// The configured headers and user-agent pool are read-only after
/// construction; every call assembles its own [`HeaderMap`].
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    user_agents: Vec<HeaderValue>,
    headers: HeaderMap,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Fetcher {
    /// Creates a fetcher from its configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Fetcher)` - Client built and headers validated
    /// * `Err(CrawlError)` - Invalid header, empty user-agent pool, or client build failure
    pub fn new(config: &FetcherConfig) -> Result<Self, CrawlError> {
        let user_agents = config
            .user_agents
            .iter()
            .map(|agent| {
                HeaderValue::from_str(agent).map_err(|_| {
                    ConfigError::InvalidHeader(format!("Invalid user agent '{}'", agent))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if user_agents.is_empty() {
            return Err(ConfigError::Validation(
                "user_agents must contain at least one entry".to_string(),
            )
            .into());
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(format!("Invalid header name '{}'", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ConfigError::InvalidHeader(format!("Invalid value for '{}'", name)))?;
            headers.insert(name, value);
        }

        Ok(Self {
            client: build_http_client()?,
            user_agents,
            headers,
            timeout: config.request_timeout(),
            retry: RetryPolicy::from(config),
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Builds the header set for one request
    pub fn request_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        let index = rand::rng().random_range(0..self.user_agents.len());
        headers.insert(USER_AGENT, self.user_agents[index].clone());
        headers
    }

    /// Performs a single GET attempt
    ///
    /// Only `200 OK` counts as success; the body is returned as text.
    pub async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(self.request_headers())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    /// Fetches a URL, retrying transient failures per the retry policy
    pub async fn fetch(&self, url: &str) -> Result<Fetched, FetchFailure> {
        with_retry(&self.retry, move |attempt| {
            tracing::trace!(url, attempt, "Sending request");
            self.fetch_once(url)
        })
        .await
    }
}

/// Maps a reqwest transport error onto the fetch failure taxonomy
fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: format!("Connection failed: {}", error),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn create_test_config() -> FetcherConfig {
        FetcherConfig {
            user_agents: vec!["AgentA/1.0".to_string(), "AgentB/2.0".to_string()],
            ..FetcherConfig::default()
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client().is_ok());
    }

    #[test]
    fn test_request_headers_rotate_from_pool() {
        let fetcher = Fetcher::new(&create_test_config()).unwrap();

        for _ in 0..20 {
            let headers = fetcher.request_headers();
            let agent = headers.get(USER_AGENT).unwrap().to_str().unwrap();
            assert!(agent == "AgentA/1.0" || agent == "AgentB/2.0");
            assert!(headers.contains_key("accept-language"));
        }
    }

    #[test]
    fn test_request_headers_do_not_leak_between_calls() {
        let fetcher = Fetcher::new(&create_test_config()).unwrap();
        let mut first = fetcher.request_headers();
        first.insert("x-mutated", HeaderValue::from_static("yes"));

        let second = fetcher.request_headers();
        assert!(!second.contains_key("x-mutated"));
    }

    #[test]
    fn test_empty_user_agent_pool_rejected() {
        let config = FetcherConfig {
            user_agents: vec![],
            ..FetcherConfig::default()
        };
        assert!(matches!(
            Fetcher::new(&config),
            Err(CrawlError::Config(ConfigError::Validation(_)))
        ));
    }

    #[test]
    fn test_max_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(3, Duration::ZERO).max_attempts(), 4);
        assert_eq!(RetryPolicy::new(u32::MAX, Duration::ZERO).max_attempts(), u32::MAX);
    }

    #[tokio::test]
    async fn test_always_failing_op_exhausts_every_attempt() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result: Result<Attempts<()>, Attempts<String>> = with_retry(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("boom".to_string()) }
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(failure.attempts, 4);
        assert_eq!(failure.value, "boom");
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result: Result<Attempts<u32>, Attempts<String>> = with_retry(&policy, |attempt| async move {
            if attempt < 3 {
                Err(format!("attempt {} failed", attempt))
            } else {
                Ok(attempt)
            }
        })
        .await;

        let success = result.unwrap();
        assert_eq!(success.value, 3);
        assert_eq!(success.attempts, 3);
        assert_eq!(success.retries(), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result: Result<Attempts<()>, Attempts<String>> = with_retry(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope".to_string()) }
        })
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_is_slept_between_attempts_only() {
        let policy = RetryPolicy::new(2, Duration::from_millis(30));
        let start = std::time::Instant::now();

        let result: Result<Attempts<()>, Attempts<String>> =
            with_retry(&policy, |_| async { Err("down".to_string()) }).await;

        assert_eq!(result.unwrap_err().attempts, 3);
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
