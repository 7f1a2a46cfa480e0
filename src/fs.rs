//! Small filesystem helpers shared by the download and extraction stages.

use std::io;
use std::path::Path;

use tracing::debug;

/// Creates `path` (and any missing parents) unless it already exists.
///
/// # Errors
///
/// Returns the underlying IO error, including when `path` exists as a file.
pub async fn create_dir_if_missing(path: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Removes everything inside `path`, keeping the directory itself.
///
/// A missing directory is not an error: there is nothing to clean.
///
/// # Errors
///
/// Returns the first IO error hit while listing or removing entries.
pub async fn clean_dir(path: &Path) -> io::Result<()> {
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&entry_path).await?;
        } else {
            tokio::fs::remove_file(&entry_path).await?;
        }
        debug!(path = %entry_path.display(), "removed");
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_dir_if_missing_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("data").join("nested");

        create_dir_if_missing(&target).await.unwrap();
        create_dir_if_missing(&target).await.unwrap();

        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_create_dir_if_missing_fails_on_file() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("occupied");
        std::fs::write(&target, b"file").unwrap();

        assert!(create_dir_if_missing(&target).await.is_err());
    }

    #[tokio::test]
    async fn test_clean_dir_removes_files_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("a.pdf"), b"a").unwrap();
        std::fs::create_dir_all(root.join(".cache").join("x").join("y")).unwrap();
        std::fs::write(root.join(".cache").join("x").join("y").join("z"), b"").unwrap();

        clean_dir(root).await.unwrap();

        assert!(root.is_dir());
        assert_eq!(std::fs::read_dir(root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_clean_dir_missing_directory_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        clean_dir(&temp_dir.path().join("never-created"))
            .await
            .unwrap();
    }
}
