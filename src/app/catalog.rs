//! Catalog ingestion: package manifest, table of contents, staleness record
//!
//! The library directory holds three server-sourced JSON files. The package
//! manifest and the table of contents are required structural data and fail
//! setup when missing or malformed; the staleness record is an optional
//! cache that degrades to empty so the app stays usable offline.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::files;
use crate::errors::{CatalogError, CatalogResult};

/// One record of the package manifest (`packages.json`)
///
/// A record without `indexes` is the catalog root and denotes every book in
/// the library.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageRecord {
    /// Package name, the stable identifier
    #[serde(rename = "en")]
    pub name: String,

    /// Localized display name
    #[serde(rename = "he")]
    pub localized_name: String,

    /// Color tag used by the presentation layer
    pub color: String,

    /// Server-estimated download size
    pub size: u64,

    /// Explicit parent package name, used verbatim when present
    #[serde(default)]
    pub parent: Option<String>,

    /// Explicit book set; absent for the root package
    #[serde(default)]
    pub indexes: Option<Vec<String>>,
}

/// A node of the table of contents (`toc.json`)
///
/// The tree nests arbitrarily; leaves carry a `title`.
#[derive(Debug, Clone, Deserialize)]
pub struct TocNode {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub contents: Vec<TocNode>,
}

/// Server staleness record (`last_updated.json`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastUpdated {
    #[serde(default)]
    pub schema_version: u32,

    /// Book title -> server last-modified timestamp
    #[serde(default)]
    pub titles: BTreeMap<String, DateTime<Utc>>,
}

impl LastUpdated {
    /// Server timestamp for a title, if the record knows it
    pub fn timestamp(&self, title: &str) -> Option<DateTime<Utc>> {
        self.titles.get(title).copied()
    }
}

/// Parsed catalog state: package records plus the full book list
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// Manifest records in declaration order
    pub packages: Vec<PackageRecord>,

    /// Every book title in the library, document order, deduplicated
    pub books: Vec<String>,
}

impl CatalogSnapshot {
    /// Load the catalog from the library directory
    ///
    /// Reads `packages.json` and `toc.json`. Both are required; a missing or
    /// malformed file aborts setup.
    pub async fn load(library_dir: &Path) -> CatalogResult<Self> {
        let packages: Vec<PackageRecord> =
            read_required_json(&library_dir.join(files::PACKAGES_FILE)).await?;
        let toc: Vec<TocNode> = read_required_json(&library_dir.join(files::TOC_FILE)).await?;

        let books = full_book_list(&toc);
        if books.is_empty() {
            return Err(CatalogError::EmptyBookList);
        }

        debug!(
            "Loaded catalog: {} packages, {} books",
            packages.len(),
            books.len()
        );

        Ok(Self { packages, books })
    }
}

/// Load the staleness record from the library directory
///
/// An absent or unparsable file yields an empty record: without it the diff
/// engine simply cannot flag anything as stale, which is the correct
/// offline-first behavior.
pub async fn load_last_updated(library_dir: &Path) -> LastUpdated {
    let path = library_dir.join(files::LAST_UPDATED_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "Malformed staleness record at {}, treating as empty: {}",
                    path.display(),
                    e
                );
                LastUpdated::default()
            }
        },
        Err(e) => {
            debug!(
                "No staleness record at {} ({}), treating as empty",
                path.display(),
                e.kind()
            );
            LastUpdated::default()
        }
    }
}

/// Collect the full book list from a table of contents
///
/// Titles are gathered from leaf nodes in document order; repeated titles
/// are kept once.
pub fn full_book_list(roots: &[TocNode]) -> Vec<String> {
    let mut titles = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for node in roots {
        collect_titles(node, &mut titles, &mut seen);
    }
    titles
}

fn collect_titles(
    node: &TocNode,
    titles: &mut Vec<String>,
    seen: &mut std::collections::HashSet<String>,
) {
    if node.contents.is_empty() {
        if let Some(title) = &node.title {
            if seen.insert(title.clone()) {
                titles.push(title.clone());
            }
        }
        return;
    }
    for child in &node.contents {
        collect_titles(child, titles, seen);
    }
}

async fn read_required_json<T: serde::de::DeserializeOwned>(path: &Path) -> CatalogResult<T> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CatalogError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(CatalogError::Io(e)),
    };

    serde_json::from_str(&content).map_err(|source| CatalogError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn toc_with_titles(titles: &[&str]) -> Vec<TocNode> {
        vec![TocNode {
            title: None,
            contents: titles
                .iter()
                .map(|t| TocNode {
                    title: Some(t.to_string()),
                    contents: Vec::new(),
                })
                .collect(),
        }]
    }

    #[test]
    fn book_list_collects_leaves_in_order() {
        let toc = toc_with_titles(&["Genesis", "Exodus", "Leviticus"]);
        assert_eq!(full_book_list(&toc), vec!["Genesis", "Exodus", "Leviticus"]);
    }

    #[test]
    fn book_list_deduplicates() {
        let toc = vec![
            TocNode {
                title: None,
                contents: toc_with_titles(&["Genesis", "Exodus"]),
            },
            TocNode {
                title: None,
                contents: toc_with_titles(&["Exodus", "Psalms"]),
            },
        ];
        assert_eq!(full_book_list(&toc), vec!["Genesis", "Exodus", "Psalms"]);
    }

    #[test]
    fn book_list_ignores_untitled_leaves() {
        let toc = vec![TocNode {
            title: None,
            contents: vec![TocNode {
                title: None,
                contents: Vec::new(),
            }],
        }];
        assert!(full_book_list(&toc).is_empty());
    }

    #[tokio::test]
    async fn load_fails_without_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let result = CatalogSnapshot::load(temp_dir.path()).await;
        assert!(matches!(result, Err(CatalogError::NotFound { .. })));
    }

    #[tokio::test]
    async fn load_parses_manifest_and_toc() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(
            temp_dir.path().join(files::PACKAGES_FILE),
            r#"[{"en": "COMPLETE LIBRARY", "he": "Whole Shelf", "color": "Other", "size": 10}]"#,
        )
        .await
        .unwrap();
        tokio::fs::write(
            temp_dir.path().join(files::TOC_FILE),
            r#"[{"contents": [{"title": "Genesis"}, {"title": "Exodus"}]}]"#,
        )
        .await
        .unwrap();

        let snapshot = CatalogSnapshot::load(temp_dir.path()).await.unwrap();
        assert_eq!(snapshot.packages.len(), 1);
        assert_eq!(snapshot.packages[0].name, "COMPLETE LIBRARY");
        assert!(snapshot.packages[0].indexes.is_none());
        assert_eq!(snapshot.books, vec!["Genesis", "Exodus"]);
    }

    #[tokio::test]
    async fn malformed_staleness_record_degrades_to_empty() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(
            temp_dir.path().join(files::LAST_UPDATED_FILE),
            "not json at all",
        )
        .await
        .unwrap();

        let record = load_last_updated(temp_dir.path()).await;
        assert!(record.titles.is_empty());
    }

    #[tokio::test]
    async fn staleness_record_parses_timestamps() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(
            temp_dir.path().join(files::LAST_UPDATED_FILE),
            r#"{"schema_version": 6, "titles": {"Genesis": "2024-05-01T00:00:00Z"}}"#,
        )
        .await
        .unwrap();

        let record = load_last_updated(temp_dir.path()).await;
        assert_eq!(record.schema_version, 6);
        assert!(record.timestamp("Genesis").is_some());
        assert!(record.timestamp("Exodus").is_none());
    }
}
