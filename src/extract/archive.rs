//! Extraction of archive groups into per-group directories.
//!
//! Each group is extracted on the blocking pool. Members of a group are read
//! one after the other into the shared target directory; every entry name is
//! normalized and checked against the target before anything is written.
//! Once all members of a group succeed, the member zips are deleted.

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

use super::ExtractError;
use super::group::{ArchiveGroup, group_archives, scan_archives};
use crate::progress::Progress;
use crate::text::normalize_bytes;

/// Counters from one [`extract_all`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    groups: usize,
    extracted: usize,
    failed: usize,
    entries: usize,
    removal_failures: usize,
}

impl ExtractStats {
    /// Archive groups found (including ones whose key could not be derived).
    #[must_use]
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Groups fully extracted.
    #[must_use]
    pub fn extracted(&self) -> usize {
        self.extracted
    }

    /// Groups that failed; their zip files are kept.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Entries (files and directories) written across all groups.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Member zips that could not be deleted after a successful extraction.
    #[must_use]
    pub fn removal_failures(&self) -> usize {
        self.removal_failures
    }
}

#[derive(Debug, Default)]
struct GroupReport {
    entries: usize,
    removal_failures: usize,
}

/// Extracts every archive group found at the top level of `directory`.
///
/// Groups run concurrently. A failing group is logged and counted; it never
/// stops the others. `progress` receives the group count after the scan and
/// advances once per group.
///
/// # Errors
///
/// Only the directory scan can fail the call ([`ExtractError::Io`]).
#[instrument(skip(progress), fields(directory = %directory.display()))]
pub async fn extract_all(
    directory: &Path,
    progress: Arc<dyn Progress>,
) -> Result<ExtractStats, ExtractError> {
    let archives = scan_archives(directory).await?;
    let (groups, rejected) = group_archives(archives);

    let mut stats = ExtractStats {
        groups: groups.len() + rejected.len(),
        failed: rejected.len(),
        ..ExtractStats::default()
    };
    progress.set_total(stats.groups);
    for error in &rejected {
        warn!(error = %error, "skipping archive");
        progress.advance();
    }

    info!(groups = groups.len(), "extracting archive groups");

    let mut tasks = JoinSet::new();
    for group in groups {
        let directory = directory.to_path_buf();
        tasks.spawn_blocking(move || {
            let result = extract_group(&directory, &group);
            (group, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((group, Ok(report))) => {
                debug!(key = %group.key(), entries = report.entries, "group extracted");
                stats.extracted += 1;
                stats.entries += report.entries;
                stats.removal_failures += report.removal_failures;
            }
            Ok((group, Err(e))) => {
                warn!(key = %group.key(), error = %e, "group extraction failed, keeping archives");
                stats.failed += 1;
            }
            Err(e) => {
                warn!(error = %ExtractError::from(e), "extraction task panicked");
                stats.failed += 1;
            }
        }
        progress.advance();
    }
    progress.finish();

    info!(
        extracted = stats.extracted,
        failed = stats.failed,
        entries = stats.entries,
        removal_failures = stats.removal_failures,
        "extraction complete"
    );
    Ok(stats)
}

/// Extracts all members of `group`, then deletes them.
fn extract_group(directory: &Path, group: &ArchiveGroup) -> Result<GroupReport, ExtractError> {
    let target = group.target(directory);
    std::fs::create_dir_all(&target).map_err(|e| ExtractError::io(&target, e))?;

    let mut report = GroupReport::default();
    for member in group.members() {
        report.entries += extract_archive(member, &target)?;
    }

    for member in group.members() {
        if let Err(e) = std::fs::remove_file(member) {
            warn!(path = %member.display(), error = %e, "cannot remove extracted archive");
            report.removal_failures += 1;
        }
    }
    Ok(report)
}

/// Extracts one zip into `target`, returning the number of entries written.
///
/// Stops at the first bad entry; entries already written stay in place.
///
/// # Errors
///
/// - [`ExtractError::Zip`] for unreadable archives or entries.
/// - [`ExtractError::Encoding`] for undecodable entry names.
/// - [`ExtractError::PathTraversal`] for entries resolving outside `target`.
/// - [`ExtractError::Io`] for write failures.
pub fn extract_archive(archive_path: &Path, target: &Path) -> Result<usize, ExtractError> {
    let file = File::open(archive_path).map_err(|e| ExtractError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::zip(archive_path, e))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ExtractError::zip(archive_path, e))?;

        let name = normalize_bytes(entry.name_raw()).map_err(|source| ExtractError::Encoding {
            archive: archive_path.to_path_buf(),
            source,
        })?;
        let destination =
            resolve_entry_path(target, &name).ok_or_else(|| ExtractError::PathTraversal {
                archive: archive_path.to_path_buf(),
                entry: name.clone(),
            })?;

        if entry.is_dir() {
            std::fs::create_dir_all(&destination).map_err(|e| ExtractError::io(&destination, e))?;
        } else {
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
            }
            let mut output =
                File::create(&destination).map_err(|e| ExtractError::io(&destination, e))?;
            io::copy(&mut entry, &mut output).map_err(|e| ExtractError::io(&destination, e))?;
        }
        written += 1;
    }

    debug!(archive = %archive_path.display(), entries = written, "archive extracted");
    Ok(written)
}

/// Joins `entry` to `target` and returns the cleaned path if it stays
/// strictly below the cleaned target.
#[must_use]
pub fn resolve_entry_path(target: &Path, entry: &str) -> Option<PathBuf> {
    let target = clean_path(target);
    let candidate = clean_path(&target.join(entry));
    (candidate != target && candidate.starts_with(&target)).then_some(candidate)
}

/// Lexically resolves `.` and `..` components without touching the disk.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
