//! Download engine for concurrent document fetching.
//!
//! The engine admits one task per URL through a semaphore, so at most
//! `concurrency` fetches are in flight and admission blocks while the gate
//! is full. Task outcomes travel over a bounded channel to a single
//! aggregator task that owns the progress sink, the counters and the
//! `erros.txt` side file; no state is shared between download tasks besides
//! the per-URL cache markers.
//!
//! # Failure policy
//!
//! - [`FailurePolicy::Strict`]: the first failure cancels every sibling task
//!   and [`DownloadEngine::download_all`] returns [`EngineError::Aborted`].
//! - [`FailurePolicy::Tolerant`]: failures are logged, appended to the side
//!   file and counted; the run carries on.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use cpi_docs_core::Cache;
//! use cpi_docs_core::download::{ClientConfig, DownloadEngine, FailurePolicy, HttpClient, HttpFetcher};
//! use cpi_docs_core::progress::NoProgress;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = Path::new("data");
//! let client = HttpClient::new(&ClientConfig::default())?;
//! let engine = DownloadEngine::new(
//!     Arc::new(HttpFetcher::new(client)),
//!     Cache::new(directory),
//!     8,
//!     FailurePolicy::Tolerant,
//! )?;
//! let urls = vec!["https://example.com/documento/download/a-b".to_string()];
//! let stats = engine.download_all(urls, directory, Arc::new(NoProgress)).await?;
//! println!("downloaded {}, failed {}", stats.downloaded(), stats.failed());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::DownloadError;
use super::fetcher::Fetch;
use crate::cache::Cache;
use crate::fs::create_dir_if_missing;
use crate::progress::Progress;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Name of the tolerant-mode failure log inside the output directory.
pub const ERRORS_FILE_NAME: &str = "erros.txt";

/// What to do when a single document fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole run on the first failure.
    #[default]
    Strict,
    /// Record the failure and keep going.
    Tolerant,
}

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The output directory or the side file could not be written.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,

    /// Strict mode stopped on a failed document.
    #[error("download of {url} failed: {source}")]
    Aborted {
        /// The document whose failure stopped the run.
        url: String,
        /// Why it failed.
        #[source]
        source: Box<DownloadError>,
    },

    /// The aggregator task panicked.
    #[error("result aggregator failed: {0}")]
    Aggregator(#[from] JoinError),
}

impl EngineError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Counters from one [`DownloadEngine::download_all`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadStats {
    downloaded: usize,
    cached: usize,
    failed: usize,
    cancelled: usize,
}

impl DownloadStats {
    /// Documents fetched during this run.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded
    }

    /// Documents skipped because a cache marker existed.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cached
    }

    /// Documents that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Tasks abandoned after a strict-mode abort.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cancelled
    }

    /// Documents that reached a final state (downloaded, cached or failed).
    #[must_use]
    pub fn processed(&self) -> usize {
        self.downloaded + self.cached + self.failed
    }
}

/// Final state of one download task.
#[derive(Debug)]
enum TaskOutcome {
    Downloaded { url: String, path: PathBuf },
    Cached { url: String },
    Failed { url: String, error: DownloadError },
    Cancelled { url: String },
}

/// Concurrent downloader for a set of document URLs.
pub struct DownloadEngine {
    fetcher: Arc<dyn Fetch>,
    cache: Cache,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    policy: FailurePolicy,
}

impl std::fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("cache", &self.cache)
            .field("concurrency", &self.concurrency)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DownloadEngine {
    /// Creates an engine allowing `concurrency` simultaneous fetches.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] unless `concurrency` is in
    /// `1..=100`.
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        cache: Cache,
        concurrency: usize,
        policy: FailurePolicy,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        Ok(Self {
            fetcher,
            cache,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            policy,
        })
    }

    /// Downloads every URL into `directory`.
    ///
    /// Cached URLs are skipped; successful fetches are recorded in the cache.
    /// `progress` advances once per URL that reaches a final state.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Io`] if the output directory or the side file cannot
    ///   be written.
    /// - [`EngineError::Aborted`] in strict mode, carrying the first failure.
    /// - [`EngineError::SemaphoreClosed`] / [`EngineError::Aggregator`] on
    ///   internal failures.
    #[instrument(skip(self, urls, progress), fields(directory = %directory.display(), policy = ?self.policy))]
    pub async fn download_all<I>(
        &self,
        urls: I,
        directory: &Path,
        progress: Arc<dyn Progress>,
    ) -> Result<DownloadStats, EngineError>
    where
        I: IntoIterator<Item = String>,
    {
        create_dir_if_missing(directory)
            .await
            .map_err(|e| EngineError::io(directory, e))?;

        let side_file = match self.policy {
            FailurePolicy::Strict => None,
            FailurePolicy::Tolerant => Some(SideFile::create(directory.join(ERRORS_FILE_NAME)).await?),
        };

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.concurrency);
        let aggregator = tokio::spawn(aggregate(
            rx,
            progress,
            side_file,
            self.policy,
            cancel.clone(),
        ));

        info!(concurrency = self.concurrency, "starting downloads");

        let mut tasks = JoinSet::new();
        for url in urls {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("run aborted, admitting no more downloads");
                    break;
                }
                permit = Arc::clone(&self.semaphore).acquire_owned() => {
                    permit.map_err(|_| EngineError::SemaphoreClosed)?
                }
            };

            let fetcher = Arc::clone(&self.fetcher);
            let cache = self.cache.clone();
            let directory = directory.to_path_buf();
            let cancel = cancel.clone();
            let tx = tx.clone();

            tasks.spawn(async move {
                // Released when the task ends.
                let _permit = permit;
                let outcome = run_task(fetcher.as_ref(), &cache, url, &directory, &cancel).await;
                if tx.send(outcome).await.is_err() {
                    warn!("aggregator gone, dropping download outcome");
                }
            });
        }
        drop(tx);

        debug!(task_count = tasks.len(), "waiting for downloads to complete");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "download task panicked");
            }
        }

        let report = aggregator.await??;
        let stats = report.stats;
        info!(
            downloaded = stats.downloaded,
            cached = stats.cached,
            failed = stats.failed,
            cancelled = stats.cancelled,
            "downloads complete"
        );

        match report.abort {
            Some((url, source)) => Err(EngineError::Aborted {
                url,
                source: Box::new(source),
            }),
            None => Ok(stats),
        }
    }
}

async fn run_task(
    fetcher: &dyn Fetch,
    cache: &Cache,
    url: String,
    directory: &Path,
    cancel: &CancellationToken,
) -> TaskOutcome {
    if cancel.is_cancelled() {
        return TaskOutcome::Cancelled { url };
    }

    if cache.exists(&url).await {
        debug!(url = %url, "already downloaded, skipping");
        return TaskOutcome::Cached { url };
    }

    match fetcher.fetch(&url, directory, cancel).await {
        Ok(path) => match cache.set(&url).await {
            Ok(()) => TaskOutcome::Downloaded { url, path },
            Err(e) => {
                let error = DownloadError::io(cache.path_for(&url), e);
                TaskOutcome::Failed { url, error }
            }
        },
        Err(e) if e.is_cancelled() => TaskOutcome::Cancelled { url },
        Err(error) => TaskOutcome::Failed { url, error },
    }
}

/// Append-only `<url>: <error>` log, removed when the run had no failures.
struct SideFile {
    path: PathBuf,
    file: File,
    lines: usize,
}

impl SideFile {
    async fn create(path: PathBuf) -> Result<Self, EngineError> {
        let file = File::create(&path)
            .await
            .map_err(|e| EngineError::io(path.clone(), e))?;
        Ok(Self {
            path,
            file,
            lines: 0,
        })
    }

    async fn record(&mut self, url: &str, error: &DownloadError) -> Result<(), EngineError> {
        let line = format!("{url}: {error}\n");
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| EngineError::io(self.path.clone(), e))?;
        self.lines += 1;
        Ok(())
    }

    async fn close(mut self) -> Result<(), EngineError> {
        self.file
            .flush()
            .await
            .map_err(|e| EngineError::io(self.path.clone(), e))?;
        drop(self.file);

        if self.lines == 0 {
            tokio::fs::remove_file(&self.path)
                .await
                .map_err(|e| EngineError::io(self.path.clone(), e))?;
        } else {
            info!(path = %self.path.display(), failures = self.lines, "failures recorded");
        }
        Ok(())
    }
}

struct AggregateReport {
    stats: DownloadStats,
    abort: Option<(String, DownloadError)>,
}

async fn aggregate(
    mut rx: mpsc::Receiver<TaskOutcome>,
    progress: Arc<dyn Progress>,
    mut side_file: Option<SideFile>,
    policy: FailurePolicy,
    cancel: CancellationToken,
) -> Result<AggregateReport, EngineError> {
    let mut stats = DownloadStats::default();
    let mut abort = None;

    while let Some(outcome) = rx.recv().await {
        match outcome {
            TaskOutcome::Downloaded { url, path } => {
                debug!(url = %url, path = %path.display(), "document saved");
                stats.downloaded += 1;
                progress.advance();
            }
            TaskOutcome::Cached { .. } => {
                stats.cached += 1;
                progress.advance();
            }
            TaskOutcome::Cancelled { url } => {
                debug!(url = %url, "download abandoned");
                stats.cancelled += 1;
            }
            TaskOutcome::Failed { url, error } => {
                stats.failed += 1;
                progress.advance();
                match policy {
                    FailurePolicy::Tolerant => {
                        warn!(url = %url, error = %error, "download failed, continuing");
                        if let Some(side_file) = side_file.as_mut() {
                            side_file.record(&url, &error).await?;
                        }
                    }
                    FailurePolicy::Strict if abort.is_none() => {
                        error!(url = %url, error = %error, "download failed, aborting run");
                        cancel.cancel();
                        abort = Some((url, error));
                    }
                    FailurePolicy::Strict => {
                        debug!(url = %url, error = %error, "further failure after abort");
                    }
                }
            }
        }
    }

    progress.finish();
    if let Some(side_file) = side_file {
        side_file.close().await?;
    }

    Ok(AggregateReport { stats, abort })
}
