//! Error types for the download module.
//!
//! Every variant carries the URL or path it concerns, so a single error line
//! in the log or in the side file is enough to act on.

use std::path::PathBuf;

use thiserror::Error;

use crate::text::EncodingError;

/// Errors that can occur while requesting or saving a document.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// A single attempt exceeded the client-wide timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Unexpected HTTP status (anything but 200 where a body is needed).
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Every attempt allowed by the retry ceiling failed.
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    RetryExhausted {
        /// The URL that kept failing.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// The error seen on the final attempt.
        #[source]
        last: Box<DownloadError>,
    },

    /// The HEAD response had no Content-Disposition header.
    #[error("no Content-Disposition header for {url}")]
    HeaderMissing {
        /// The document URL.
        url: String,
    },

    /// The Content-Disposition header did not yield a usable filename.
    #[error("cannot read a filename from Content-Disposition {value:?} for {url}")]
    HeaderMalformed {
        /// The document URL.
        url: String,
        /// Lossy rendering of the header value.
        value: String,
    },

    /// The suggested filename could not be decoded.
    #[error("cannot normalize filename for {url}: {source}")]
    Encoding {
        /// The document URL.
        url: String,
        /// The decoding failure.
        #[source]
        source: EncodingError,
    },

    /// File system error while saving (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("cannot build HTTP client: {source}")]
    ClientBuild {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },

    /// The request was abandoned because a sibling task failed.
    #[error("request to {url} cancelled")]
    Cancelled {
        /// The URL whose request was abandoned.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a cancellation marker.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Returns true for the cancellation marker, which is never a real failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path, which the source errors do not carry.
