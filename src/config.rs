//! Run configuration.
//!
//! A [`Config`] is assembled once from the command line, validated, and then
//! only read. The HTTP client settings are derived from it with
//! [`Config::client_config`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::download::{
    ClientConfig, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, FailurePolicy,
};

/// Default output directory.
pub const DEFAULT_DIRECTORY: &str = "data";

/// Default number of listing pages to harvest.
pub const DEFAULT_PAGES: u32 = 1;

/// Listing of documents received by the inquiry committee.
pub const DEFAULT_LISTING_URL: &str = "https://legis.senado.leg.br/comissoes/docsRecCPI?codcol=2441";

/// Prefix shared by every document download link on the listing.
pub const DEFAULT_DOCUMENT_PREFIX: &str =
    "https://legis.senado.leg.br/sdleg-getter/documento/download/";

const MAX_CONCURRENCY: usize = 100;

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Concurrency outside `1..=100`.
    #[error("invalid concurrency {0}: must be between 1 and {MAX_CONCURRENCY}")]
    Concurrency(usize),

    /// No listing page to harvest.
    #[error("page count must be at least 1")]
    Pages,

    /// A zero timeout would fail every request.
    #[error("timeout must be greater than zero")]
    Timeout,

    /// The listing URL does not parse.
    #[error("invalid listing URL {url:?}: {reason}")]
    ListingUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The document prefix is empty.
    #[error("document prefix must not be empty")]
    DocumentPrefix,
}

/// Immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Output directory for documents, cache and extracted archives.
    pub directory: PathBuf,
    /// Maximum simultaneous downloads (and connections per host).
    pub concurrency: usize,
    /// Maximum attempts per request.
    pub max_retries: u32,
    /// Timeout for each request attempt.
    pub timeout: Duration,
    /// Wipe the output directory before running.
    pub cleanup: bool,
    /// Strict or tolerant handling of failed documents.
    pub failure_policy: FailurePolicy,
    /// Number of listing pages to harvest.
    pub pages: u32,
    /// Listing page URL; `page=N` is appended per page.
    pub listing_url: String,
    /// Only links starting with this prefix are downloaded.
    pub document_prefix: String,
    /// Extract archives after downloading.
    pub extract: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            cleanup: false,
            failure_policy: FailurePolicy::Strict,
            pages: DEFAULT_PAGES,
            listing_url: DEFAULT_LISTING_URL.to_string(),
            document_prefix: DEFAULT_DOCUMENT_PREFIX.to_string(),
            extract: true,
        }
    }
}

impl Config {
    /// Checks every value that would otherwise fail deep inside the run.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::Concurrency(self.concurrency));
        }
        if self.pages == 0 {
            return Err(ConfigError::Pages);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Timeout);
        }
        Url::parse(&self.listing_url).map_err(|e| ConfigError::ListingUrl {
            url: self.listing_url.clone(),
            reason: e.to_string(),
        })?;
        if self.document_prefix.trim().is_empty() {
            return Err(ConfigError::DocumentPrefix);
        }
        Ok(())
    }

    /// HTTP client settings: one pooled connection per download slot.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.concurrency, self.max_retries, self.timeout)
    }
}
