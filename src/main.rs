//! CLI entry point for the CPI documents downloader.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cpi_docs_core::download::ERRORS_FILE_NAME;
use cpi_docs_core::progress::progress_bar;
use cpi_docs_core::{
    Cache, Config, DownloadEngine, FailurePolicy, Harvester, HttpClient, HttpFetcher,
    extract_all,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > DEBUG env var > quiet flag > verbose flag > default (info)
    let default_level = args.default_log_level(std::env::var_os("DEBUG").is_some());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = args.to_config();
    config.validate().context("invalid configuration")?;
    let show_progress = !args.quiet && io::stderr().is_terminal();

    run(&config, show_progress).await
}

async fn run(config: &Config, show_progress: bool) -> Result<()> {
    let directory = &config.directory;
    info!(directory = %directory.display(), "cpi-docs starting");

    if config.cleanup {
        info!(directory = %directory.display(), "cleaning output directory");
        cpi_docs_core::fs::clean_dir(directory)
            .await
            .with_context(|| format!("cannot clean {}", directory.display()))?;
    }

    let client = HttpClient::new(&config.client_config()).context("cannot create HTTP client")?;

    let harvester = Harvester::new(
        client.clone(),
        &config.listing_url,
        config.document_prefix.as_str(),
    )?;
    let page_count = usize::try_from(config.pages).unwrap_or(usize::MAX);
    let urls = harvester
        .harvest(
            config.pages,
            progress_bar(page_count, "pages", show_progress),
            &CancellationToken::new(),
        )
        .await
        .context("cannot harvest document links")?;
    info!(documents = urls.len(), "document links collected");

    let engine = DownloadEngine::new(
        Arc::new(HttpFetcher::new(client)),
        Cache::new(directory),
        config.concurrency,
        config.failure_policy,
    )?;
    let stats = engine
        .download_all(
            urls.iter().cloned(),
            directory,
            progress_bar(urls.len(), "documents", show_progress),
        )
        .await
        .context("download failed")?;

    info!(
        downloaded = stats.downloaded(),
        cached = stats.cached(),
        failed = stats.failed(),
        "downloads finished"
    );

    if config.extract {
        let extract_stats = extract_all(directory, progress_bar(0, "archives", show_progress))
            .await
            .context("cannot extract archives")?;
        if extract_stats.failed() > 0 {
            warn!(failed = extract_stats.failed(), "some archive groups were not extracted");
        }
    } else {
        debug!("archive extraction disabled");
    }

    if config.failure_policy == FailurePolicy::Tolerant && stats.failed() > 0 {
        eprintln!(
            "{} documents failed; see {}",
            stats.failed(),
            directory.join(ERRORS_FILE_NAME).display()
        );
    }

    Ok(())
}
