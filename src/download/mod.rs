//! Document downloading over HTTP.
//!
//! This module provides the retrying client used for every request, the
//! per-document fetcher (HEAD for the filename, GET streamed to disk) and the
//! engine that runs fetches concurrently against the marker cache.
//!
//! # Features
//!
//! - Retry on transport errors and HTTP 429 with pure exponential backoff
//! - Filenames taken from Content-Disposition and normalized to ASCII
//! - Streaming downloads (memory-efficient for large files)
//! - Strict or tolerant failure policy with sibling cancellation

mod client;
mod engine;
mod error;
mod fetcher;
mod filename;
mod retry;

pub use client::{ClientConfig, DEFAULT_CONNECTIONS_PER_HOST, DEFAULT_TIMEOUT, HttpClient};
pub use engine::{
    DEFAULT_CONCURRENCY, DownloadEngine, DownloadStats, ERRORS_FILE_NAME, EngineError,
    FailurePolicy,
};
pub use error::DownloadError;
pub use fetcher::{Fetch, HttpFetcher};
pub use retry::{Attempt, DEFAULT_MAX_RETRIES, RetryPolicy, retry_with_backoff};
