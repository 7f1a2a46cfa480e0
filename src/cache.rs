//! Marker-file cache of already fetched URLs.
//!
//! Each URL maps to an empty file below `<directory>/.cache`. The marker's
//! existence is the whole record: no content, no metadata, no expiry. The
//! path is derived from the URL's last path segment split on `-`, so
//! `.../download/3f2a-77b1` becomes `.cache/3f2a/77b1`.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use url::Url;

/// Name of the hidden cache directory inside the output directory.
pub const CACHE_DIR_NAME: &str = ".cache";

/// Marker-file cache rooted at `<directory>/.cache`.
///
/// Markers are keyed by URL, so concurrent download tasks never write the
/// same marker and the cache needs no locking.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    /// Creates a cache for the given output directory.
    #[must_use]
    pub fn new(directory: &Path) -> Self {
        Self {
            root: directory.join(CACHE_DIR_NAME),
        }
    }

    /// Returns the marker path for `url`.
    ///
    /// This is a pure function of the URL.
    #[must_use]
    pub fn path_for(&self, url: &str) -> PathBuf {
        let components = marker_components(url);
        if components.is_empty() {
            return self.root.join(urlencoding::encode(url).as_ref());
        }

        let mut path = self.root.clone();
        path.extend(components);
        path
    }

    /// Returns whether `url` was already fetched.
    ///
    /// A missing marker is the normal "not cached" answer. Unexpected IO
    /// errors are logged and also reported as "not cached": the worst outcome
    /// is downloading the file again, which is preferable to aborting the run.
    #[instrument(level = "debug", skip(self))]
    pub async fn exists(&self, url: &str) -> bool {
        let marker = self.path_for(url);
        match tokio::fs::metadata(&marker).await {
            // A directory here is the parent of some other URL's marker.
            Ok(metadata) => metadata.is_file(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(url = %url, path = %marker.display(), error = %e, "cannot read cache marker, treating as not cached");
                false
            }
        }
    }

    /// Records `url` as fetched.
    ///
    /// Creates missing parent directories. Setting an existing marker is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the marker or its parents cannot be created.
    #[instrument(level = "debug", skip(self))]
    pub async fn set(&self, url: &str) -> io::Result<()> {
        let marker = self.path_for(url);
        if let Some(parent) = marker.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&marker)
            .await?;

        debug!(path = %marker.display(), "cache marker set");
        Ok(())
    }
}

/// Splits the last non-empty path segment of `url` on hyphens.
fn marker_components(url: &str) -> Vec<String> {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(str::to_string),
        Err(_) => url
            .split('/')
            .rfind(|s| !s.is_empty())
            .map(str::to_string),
    };

    segment
        .map(|segment| {
            segment
                .split('-')
                .filter(|part| !part.is_empty() && *part != "." && *part != "..")
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
