//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use cpi_docs_core::config::{
    DEFAULT_DIRECTORY, DEFAULT_DOCUMENT_PREFIX, DEFAULT_LISTING_URL, DEFAULT_PAGES,
};
use cpi_docs_core::download::{DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
use cpi_docs_core::{Config, FailurePolicy};

/// Download the documents received by the COVID-19 inquiry committee.
///
/// Harvests the committee's document listing, downloads every linked
/// document into the output directory and unpacks multi-part zip archives.
#[derive(Parser, Debug)]
#[command(name = "cpi-docs")]
#[command(author, version, about)]
pub struct Args {
    /// Output directory for documents and extracted archives
    #[arg(short, long, default_value = DEFAULT_DIRECTORY)]
    pub directory: PathBuf,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'w', long, default_value_t = DEFAULT_CONCURRENCY, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=100))]
    pub workers: usize,

    /// Maximum attempts per request
    #[arg(short, long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub retries: u32,

    /// Timeout for each request attempt, in seconds
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Wipe the output directory (cache included) before running
    #[arg(short, long)]
    pub cleanup: bool,

    /// Record failed documents in erros.txt and keep going
    #[arg(long)]
    pub tolerant: bool,

    /// Number of listing pages to harvest
    #[arg(short, long, default_value_t = DEFAULT_PAGES, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,

    /// Listing page URL
    #[arg(long, default_value = DEFAULT_LISTING_URL)]
    pub listing_url: String,

    /// Only links starting with this prefix are downloaded
    #[arg(long, default_value = DEFAULT_DOCUMENT_PREFIX)]
    pub document_prefix: String,

    /// Skip zip extraction after downloading
    #[arg(long)]
    pub no_extract: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Builds the run configuration from the parsed flags.
    #[must_use]
    pub fn to_config(&self) -> Config {
        Config {
            directory: self.directory.clone(),
            concurrency: self.workers,
            max_retries: self.retries,
            timeout: Duration::from_secs(self.timeout),
            cleanup: self.cleanup,
            failure_policy: if self.tolerant {
                FailurePolicy::Tolerant
            } else {
                FailurePolicy::Strict
            },
            pages: self.pages,
            listing_url: self.listing_url.clone(),
            document_prefix: self.document_prefix.clone(),
            extract: !self.no_extract,
        }
    }

    /// Log level used when `RUST_LOG` is not set.
    ///
    /// Priority: `DEBUG` env var present > quiet flag > verbose flag > info.
    #[must_use]
    pub fn default_log_level(&self, debug_env: bool) -> &'static str {
        if debug_env {
            return "debug";
        }
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["cpi-docs"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.workers, 8); // DEFAULT_CONCURRENCY
        assert_eq!(args.retries, 8); // DEFAULT_MAX_RETRIES
        assert_eq!(args.timeout, 300);
        assert_eq!(args.pages, 1);
        assert_eq!(args.directory, PathBuf::from("data"));
        assert!(!args.tolerant);
        assert!(!args.no_extract);
    }

    #[test]
    fn test_cli_defaults_match_config_defaults() {
        let args = Args::try_parse_from(["cpi-docs"]).unwrap();
        assert_eq!(args.to_config(), Config::default());
    }

    #[test]
    fn test_cli_short_flags() {
        let args = Args::try_parse_from([
            "cpi-docs", "-d", "/tmp/out", "-w", "4", "-r", "2", "-t", "30", "-c", "-p", "3",
        ])
        .unwrap();
        let config = args.to_config();

        assert_eq!(config.directory, PathBuf::from("/tmp/out"));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.cleanup);
        assert_eq!(config.pages, 3);
    }

    #[test]
    fn test_cli_tolerant_and_no_extract() {
        let args = Args::try_parse_from(["cpi-docs", "--tolerant", "--no-extract"]).unwrap();
        let config = args.to_config();

        assert_eq!(config.failure_policy, FailurePolicy::Tolerant);
        assert!(!config.extract);
    }

    #[test]
    fn test_cli_rejects_out_of_range_values() {
        for argv in [
            ["cpi-docs", "-w", "0"],
            ["cpi-docs", "-w", "101"],
            ["cpi-docs", "-p", "0"],
            ["cpi-docs", "-t", "0"],
        ] {
            assert!(Args::try_parse_from(argv).is_err(), "Expected rejection for {argv:?}");
        }
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["cpi-docs", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["cpi-docs", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_default_log_level_priority() {
        let quiet_verbose = Args::try_parse_from(["cpi-docs", "-q", "-vv"]).unwrap();
        assert_eq!(quiet_verbose.default_log_level(true), "debug");
        assert_eq!(quiet_verbose.default_log_level(false), "error");

        let verbose = Args::try_parse_from(["cpi-docs", "-vv"]).unwrap();
        assert_eq!(verbose.default_log_level(false), "trace");

        let plain = Args::try_parse_from(["cpi-docs"]).unwrap();
        assert_eq!(plain.default_log_level(false), "info");
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        // --help causes early exit, so we check it returns an error with Help kind
        let result = Args::try_parse_from(["cpi-docs", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
