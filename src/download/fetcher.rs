//! Fetching a single document to disk.
//!
//! [`Fetch`] is the unit of work the download engine schedules. The HTTP
//! implementation asks the server for the filename with a HEAD request, then
//! streams the GET body into `directory/<normalized name>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::CONTENT_DISPOSITION;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::filename::filename_from_content_disposition;
use super::{DownloadError, HttpClient};

/// Fetches one document into a directory.
///
/// Implementations must stop promptly once `cancel` fires and report
/// [`DownloadError::Cancelled`] in that case.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Downloads `url` into `directory`, returning the written file's path.
    async fn fetch(
        &self,
        url: &str,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError>;
}

/// [`Fetch`] over HTTP: HEAD for the filename, GET for the bytes.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    /// Creates a fetcher sharing `client`'s connection pool.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Resolves the normalized filename suggested by the server for `url`.
    ///
    /// # Errors
    ///
    /// Request errors from the client, [`DownloadError::HeaderMissing`] when
    /// the server sends no Content-Disposition, plus the parsing errors of
    /// the header value.
    pub async fn resolve_filename(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, DownloadError> {
        let response = self.client.head(url, cancel).await?;
        let header = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .ok_or_else(|| DownloadError::HeaderMissing {
                url: url.to_string(),
            })?;

        filename_from_content_disposition(url, header.as_bytes())
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    #[instrument(skip(self, directory, cancel), fields(url = %url))]
    async fn fetch(
        &self,
        url: &str,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        let name = self.resolve_filename(url, cancel).await?;
        let file_path = directory.join(&name);
        debug!(path = %file_path.display(), "resolved output path");

        let response = self.client.get(url, cancel).await?;
        if response.status() != StatusCode::OK {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }

        let mut file = File::create(&file_path)
            .await
            .map_err(|e| DownloadError::io(file_path.clone(), e))?;

        let stream_result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DownloadError::cancelled(url)),
            result = stream_to_file(&mut file, response, url, &file_path) => result,
        };

        let bytes = match stream_result {
            Ok(bytes) => bytes,
            Err(e) => {
                drop(file);
                debug!(path = %file_path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&file_path).await;
                return Err(e);
            }
        };

        info!(path = %file_path.display(), bytes, "download complete");
        Ok(file_path)
    }
}

/// Streams response body to file, returning bytes written.
///
/// Kept separate so the caller can clean up the partial file on error.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}
