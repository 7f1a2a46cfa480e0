//! CPI documents core library
//!
//! This library harvests the document listing of a parliamentary inquiry
//! committee, downloads every linked document with bounded concurrency and
//! retry, remembers what was already fetched, and unpacks multi-part zip
//! archives.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`harvest`] - Link collection from the paginated listing
//! - [`download`] - Retrying HTTP client, fetcher and concurrent engine
//! - [`cache`] - Marker-file record of fetched URLs
//! - [`extract`] - Grouping and extraction of zip archives
//! - [`text`] - Filename normalization to plain ASCII letters
//! - [`config`] - Run configuration and validation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod download;
pub mod extract;
pub mod fs;
pub mod harvest;
pub mod progress;
pub mod text;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use cache::Cache;
pub use config::{Config, ConfigError};
pub use download::{
    ClientConfig, DownloadEngine, DownloadError, DownloadStats, EngineError, FailurePolicy,
    Fetch, HttpClient, HttpFetcher, RetryPolicy,
};
pub use extract::{ExtractError, ExtractStats, extract_all};
pub use harvest::{HarvestError, Harvester, extract_links};
pub use progress::{NoProgress, Progress};
pub use text::{EncodingError, normalize, normalize_bytes};
