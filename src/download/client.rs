//! Retrying HTTP client shared by link harvesting and file fetching.
//!
//! Every request goes through [`retry_with_backoff`]: transport errors and
//! 429 responses are retried with pure exponential backoff, any other
//! response is handed back to the caller untouched.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::DownloadError;
use super::retry::{Attempt, RetryPolicy, retry_with_backoff};

/// Default per-host connection budget.
pub const DEFAULT_CONNECTIONS_PER_HOST: usize = 8;

/// Default total timeout for one attempt (5 minutes, for large files).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Immutable client settings, fixed for a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    max_connections_per_host: usize,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_connections_per_host: DEFAULT_CONNECTIONS_PER_HOST,
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with the default 1s backoff base.
    #[must_use]
    pub fn new(max_connections_per_host: usize, max_retries: u32, timeout: Duration) -> Self {
        Self {
            max_connections_per_host: max_connections_per_host.max(1),
            timeout,
            retry_policy: RetryPolicy::with_max_attempts(max_retries),
        }
    }

    /// Replaces the retry policy (tests use a millisecond backoff base).
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Maximum pooled connections kept per host.
    #[must_use]
    pub fn max_connections_per_host(&self) -> usize {
        self.max_connections_per_host
    }

    /// Timeout applied to each individual attempt.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retry ceiling and backoff base.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

/// HTTP client with built-in retry.
///
/// Created once per run and cloned into tasks; clones share the same
/// connection pool and the same per-host request budget.
///
/// # Example
///
/// ```no_run
/// use cpi_docs_core::download::{ClientConfig, HttpClient};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new(&ClientConfig::default())?;
/// let response = client.get("https://example.com/", &CancellationToken::new()).await?;
/// println!("HTTP {}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_policy: RetryPolicy,
    // Bounds in-flight attempts; reqwest only caps idle connections.
    connections: Arc<Semaphore>,
}

impl HttpClient {
    /// Builds a client from `config`.
    ///
    /// The pool keeps at most `max_connections_per_host` idle connections per
    /// host, and at most that many attempts wait on a response head at once.
    /// Every run talks to a single host, so one budget covers all callers.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if reqwest rejects the settings.
    #[instrument(level = "debug")]
    pub fn new(config: &ClientConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.max_connections_per_host)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;

        debug!(
            max_connections_per_host = config.max_connections_per_host,
            max_attempts = config.retry_policy.max_attempts(),
            timeout_secs = config.timeout.as_secs(),
            "HTTP client ready"
        );

        Ok(Self {
            client,
            retry_policy: config.retry_policy.clone(),
            connections: Arc::new(Semaphore::new(config.max_connections_per_host)),
        })
    }

    /// Sends a bodiless request, retrying transport errors and 429s.
    ///
    /// Any other response, successful or not, is returned as-is. Each attempt
    /// holds a connection permit until the response head arrives.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::RetryExhausted`] when every attempt failed.
    /// - [`DownloadError::Cancelled`] when `cancel` fires.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Response, DownloadError> {
        retry_with_backoff(
            &self.retry_policy,
            url,
            cancel,
            || {
                let request = self.client.request(method.clone(), url);
                let connections = &self.connections;
                async move {
                    // Never closed, so acquire cannot fail.
                    let _permit = connections.acquire().await.ok();
                    match request.send().await {
                        Err(e) => Attempt::Retry(DownloadError::network(url, e)),
                        Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                            Attempt::Retry(DownloadError::http_status(url, 429))
                        }
                        Ok(response) => Attempt::Done(response),
                    }
                }
            },
            tokio::time::sleep,
        )
        .await
    }

    /// Sends a GET request. See [`send`](Self::send).
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Response, DownloadError> {
        self.send(Method::GET, url, cancel).await
    }

    /// Sends a HEAD request. See [`send`](Self::send).
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn head(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Response, DownloadError> {
        self.send(Method::HEAD, url, cancel).await
    }
}
