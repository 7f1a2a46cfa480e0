//! Error types for archive extraction.

use std::path::PathBuf;

use thiserror::Error;
use tokio::task::JoinError;

use crate::text::EncodingError;

/// Errors that can occur while grouping or extracting archives.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// File system error (scan, create, write, remove).
    #[error("IO error on {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The archive is not a readable zip file.
    #[error("cannot read zip archive {archive}: {source}")]
    Zip {
        /// The archive being read.
        archive: PathBuf,
        /// The zip reader error.
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry would be written outside the group's target directory.
    #[error("entry {entry:?} in {archive} escapes the target directory")]
    PathTraversal {
        /// The archive containing the entry.
        archive: PathBuf,
        /// The normalized entry name.
        entry: String,
    },

    /// An archive name does not yield a usable group key.
    #[error("cannot derive an archive group from {name:?}")]
    SequenceParse {
        /// The offending file name.
        name: String,
    },

    /// An entry name could not be decoded.
    #[error("cannot normalize entry name in {archive}: {source}")]
    Encoding {
        /// The archive containing the entry.
        archive: PathBuf,
        /// The decoding failure.
        #[source]
        source: EncodingError,
    },

    /// A blocking extraction task panicked.
    #[error("extraction task failed: {0}")]
    Join(#[from] JoinError),
}

impl ExtractError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a zip reader error.
    pub fn zip(archive: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            archive: archive.into(),
            source,
        }
    }
}
