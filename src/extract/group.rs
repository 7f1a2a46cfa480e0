//! Grouping of multi-part archives.
//!
//! Archives are published as `<name><n>.zip` parts (`Relatorio-1.zip`,
//! `Relatorio-2.zip`, ...). Parts sharing the same `<name>` are merged into
//! one directory named after it; a zip without a trailing number forms a
//! group of its own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use super::ExtractError;
use crate::text::normalize;

/// `<prefix><digits>.zip`, case-insensitive; the prefix must end in a non-digit.
#[allow(clippy::expect_used)]
static SEQUENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*\D)(\d+)\.zip$").expect("sequence regex is valid") // Static pattern, safe to panic
});

const ZIP_SUFFIX: &str = ".zip";

/// A set of zip files extracted into the same target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveGroup {
    key: String,
    members: Vec<PathBuf>,
}

impl ArchiveGroup {
    /// Normalized group key, used as the target directory name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Member archives, sorted.
    #[must_use]
    pub fn members(&self) -> &[PathBuf] {
        &self.members
    }

    /// Target directory for this group below `directory`.
    #[must_use]
    pub fn target(&self, directory: &Path) -> PathBuf {
        directory.join(&self.key)
    }
}

/// Derives the group key of an archive file name.
///
/// `a-1.zip` and `a-2.zip` both map to `a`; `notas.zip` maps to `notas`.
/// Separators left between the prefix and the sequence number are trimmed.
///
/// # Errors
///
/// [`ExtractError::SequenceParse`] if the name is not a `.zip` file or the
/// key would be empty, `.` or `..`.
pub fn group_key(file_name: &str) -> Result<String, ExtractError> {
    let parse_error = || ExtractError::SequenceParse {
        name: file_name.to_string(),
    };

    let stem = match SEQUENCE_PATTERN.captures(file_name) {
        Some(captures) => captures
            .get(1)
            .map_or("", |m| m.as_str())
            .trim_end_matches(['-', '_', '.', ' ']),
        None => strip_zip_suffix(file_name).ok_or_else(parse_error)?,
    };

    let key = normalize(stem.trim());
    if key.is_empty() || key == "." || key == ".." {
        return Err(parse_error());
    }
    Ok(key)
}

fn strip_zip_suffix(file_name: &str) -> Option<&str> {
    let split = file_name.len().checked_sub(ZIP_SUFFIX.len())?;
    let suffix = file_name.get(split..)?;
    suffix
        .eq_ignore_ascii_case(ZIP_SUFFIX)
        .then(|| &file_name[..split])
}

/// Returns whether `file_name` looks like a zip archive.
#[must_use]
pub fn is_zip_name(file_name: &str) -> bool {
    strip_zip_suffix(file_name).is_some()
}

/// Groups archive paths by key.
///
/// Groups come back ordered by key. Paths whose name does not produce a key
/// are returned separately so the caller can report them.
#[must_use]
pub fn group_archives<I>(paths: I) -> (Vec<ArchiveGroup>, Vec<ExtractError>)
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut rejected = Vec::new();

    for path in paths {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match group_key(&name) {
            Ok(key) => groups.entry(key).or_default().push(path),
            Err(e) => rejected.push(e),
        }
    }

    let groups = groups
        .into_iter()
        .map(|(key, mut members)| {
            members.sort();
            ArchiveGroup { key, members }
        })
        .collect();
    (groups, rejected)
}

/// Lists the zip files directly inside `directory`.
///
/// The scan is not recursive: the cache and previously extracted group
/// directories are never visited.
///
/// # Errors
///
/// [`ExtractError::Io`] if the directory cannot be read.
#[instrument(level = "debug", fields(directory = %directory.display()))]
pub async fn scan_archives(directory: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut entries = tokio::fs::read_dir(directory)
        .await
        .map_err(|e| ExtractError::io(directory, e))?;

    let mut archives = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ExtractError::io(directory, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ExtractError::io(entry.path(), e))?;
        if file_type.is_file() && is_zip_name(&entry.file_name().to_string_lossy()) {
            archives.push(entry.path());
        }
    }

    debug!(count = archives.len(), "found zip archives");
    Ok(archives)
}
