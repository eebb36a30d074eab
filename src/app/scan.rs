//! Local download-directory scanning
//!
//! One archive per book, named `{title}.zip`; the file modification time is
//! the local staleness signal. Results come back in directory-listing order,
//! so callers must not assume any particular ordering.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::constants::files;

/// A content archive found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArchive {
    /// Book title, derived by stripping the archive suffix
    pub title: String,

    /// File modification time
    pub modified: DateTime<Utc>,
}

/// List the book archives present in the download directory
///
/// A missing directory is "zero local files", not an error. Files without
/// the archive extension are ignored.
pub async fn scan_download_dir(dir: &Path) -> std::io::Result<Vec<LocalArchive>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Download directory {} absent, no local files", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut archives = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(files::ARCHIVE_EXT) {
            continue;
        }
        let Some(title) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let metadata = entry.metadata().await?;
        let modified = DateTime::<Utc>::from(metadata.modified()?);
        archives.push(LocalArchive {
            title: title.to_string(),
            modified,
        });
    }

    debug!("Found {} local archives in {}", archives.len(), dir.display());
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_directory_yields_no_files() {
        let temp_dir = TempDir::new().unwrap();
        let archives = scan_download_dir(&temp_dir.path().join("nope")).await.unwrap();
        assert!(archives.is_empty());
    }

    #[tokio::test]
    async fn titles_derived_from_archive_names() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["Genesis.zip", "Midrash Rabbah.zip", "notes.txt", "toc.json"] {
            tokio::fs::write(temp_dir.path().join(name), "x").await.unwrap();
        }

        let mut titles: Vec<String> = scan_download_dir(temp_dir.path())
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        titles.sort();

        assert_eq!(titles, vec!["Genesis", "Midrash Rabbah"]);
    }

    #[tokio::test]
    async fn modification_time_is_captured() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("Genesis.zip"), "x")
            .await
            .unwrap();

        let archives = scan_download_dir(temp_dir.path()).await.unwrap();
        assert_eq!(archives.len(), 1);
        let age = Utc::now() - archives[0].modified;
        assert!(age.num_seconds() < 60);
    }
}
