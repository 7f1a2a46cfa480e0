//! Link harvesting from the paginated document listing.
//!
//! Every listing page is fetched concurrently; each page's HTML is scanned
//! for anchors pointing below the document download prefix. The harvest is
//! all-or-nothing: one failed page fails the whole harvest, because a partial
//! listing would silently skip documents.

use std::collections::HashSet;
use std::sync::Arc;

use reqwest::StatusCode;
use scraper::{Html, Selector};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::download::{DownloadError, HttpClient};
use crate::progress::Progress;

/// Errors that can occur while harvesting document links.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The listing URL could not be parsed.
    #[error("invalid listing URL {url}: {source}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// The parse failure.
        #[source]
        source: url::ParseError,
    },

    /// A listing page could not be fetched.
    #[error("cannot fetch listing page {page}: {source}")]
    Page {
        /// 1-based page index.
        page: u32,
        /// The request failure.
        #[source]
        source: DownloadError,
    },

    /// A page task panicked.
    #[error("listing page task failed: {0}")]
    Join(#[from] JoinError),
}

/// Collects document links from the listing pages.
#[derive(Debug, Clone)]
pub struct Harvester {
    client: HttpClient,
    listing_url: Url,
    prefix: String,
}

impl Harvester {
    /// Creates a harvester for `listing_url`, keeping links under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidUrl`] if `listing_url` does not parse.
    pub fn new(
        client: HttpClient,
        listing_url: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, HarvestError> {
        let listing_url = Url::parse(listing_url).map_err(|source| HarvestError::InvalidUrl {
            url: listing_url.to_string(),
            source,
        })?;

        Ok(Self {
            client,
            listing_url,
            prefix: prefix.into(),
        })
    }

    /// Returns the URL of listing page `page` (`page=N` appended to the query).
    #[must_use]
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.listing_url.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url
    }

    /// Fetches pages `1..=page_count` concurrently and returns the union of
    /// their document links.
    ///
    /// `progress` advances once per completed page. The first page failure
    /// aborts the remaining page requests.
    ///
    /// # Errors
    ///
    /// [`HarvestError::Page`] for the first page that failed (non-200 status,
    /// exhausted retries, cancellation).
    #[instrument(skip(self, progress, cancel), fields(listing = %self.listing_url))]
    pub async fn harvest(
        &self,
        page_count: u32,
        progress: Arc<dyn Progress>,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, HarvestError> {
        let pages_cancel = cancel.child_token();
        let mut tasks = JoinSet::new();

        for page in 1..=page_count {
            let client = self.client.clone();
            let url = self.page_url(page);
            let prefix = self.prefix.clone();
            let cancel = pages_cancel.clone();
            tasks.spawn(async move {
                let links = fetch_page_links(&client, &url, &prefix, &cancel)
                    .await
                    .map_err(|source| HarvestError::Page { page, source })?;
                debug!(page, links = links.len(), "listing page parsed");
                Ok::<_, HarvestError>(links)
            });
        }

        let mut links = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined? {
                Ok(page_links) => {
                    links.extend(page_links);
                    progress.advance();
                }
                Err(e) => {
                    warn!(error = %e, "listing page failed, aborting harvest");
                    pages_cancel.cancel();
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }
        progress.finish();

        info!(pages = page_count, documents = links.len(), "harvest complete");
        Ok(links)
    }
}

async fn fetch_page_links(
    client: &HttpClient,
    url: &Url,
    prefix: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>, DownloadError> {
    let response = client.get(url.as_str(), cancel).await?;
    if response.status() != StatusCode::OK {
        return Err(DownloadError::http_status(url.as_str(), response.status().as_u16()));
    }

    let body = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(DownloadError::cancelled(url.as_str())),
        body = response.text() => body.map_err(|e| DownloadError::network(url.as_str(), e))?,
    };

    Ok(extract_links(&body, url, prefix))
}

/// Returns the anchors of `html` that point below `prefix`, in document order.
///
/// `href`s are resolved against `base` and stripped of their fragment before
/// the prefix test; anchors that do not resolve are skipped.
#[must_use]
pub fn extract_links(html: &str, base: &Url, prefix: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .filter(|url| url.starts_with(prefix))
        .collect()
}
