//! Book state and desired-set projection
//!
//! `desired` is derived state: it is recomputed wholesale from the
//! reconciled selection whenever the selection changes, never patched
//! incrementally.

use std::collections::{BTreeMap, BTreeSet};

use crate::app::hierarchy::PackageHierarchy;

/// A single content unit addressable by title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub title: String,

    /// Whether this book should exist locally given the current selection
    pub desired: bool,
}

/// Per-book desired flags for the whole catalog, keyed by title
pub type BooksState = BTreeMap<String, Book>;

/// Project the reconciled selection onto the full catalog book list
///
/// The desired set is the union of the effective book sets of every clicked
/// package; every other catalog book is present with `desired = false`. Pure
/// and idempotent over its inputs.
pub fn project(catalog_books: &[String], hierarchy: &PackageHierarchy) -> BooksState {
    let desired: BTreeSet<&str> = hierarchy
        .packages()
        .iter()
        .filter(|p| p.clicked)
        .flat_map(|p| p.books().iter().map(String::as_str))
        .collect();

    catalog_books
        .iter()
        .map(|title| {
            (
                title.clone(),
                Book {
                    title: title.clone(),
                    desired: desired.contains(title.as_str()),
                },
            )
        })
        .collect()
}

/// Titles currently flagged as desired
pub fn desired_titles(books: &BooksState) -> BTreeSet<String> {
    books
        .values()
        .filter(|b| b.desired)
        .map(|b| b.title.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::catalog::{CatalogSnapshot, PackageRecord};

    fn build_hierarchy(clicked: &[&str]) -> (Vec<String>, PackageHierarchy) {
        let books: Vec<String> = ["Genesis", "Exodus", "Leviticus", "Weird Random Book"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let snapshot = CatalogSnapshot {
            packages: vec![
                PackageRecord {
                    name: "COMPLETE LIBRARY".to_string(),
                    localized_name: "everything".to_string(),
                    color: "Other".to_string(),
                    size: 10,
                    parent: None,
                    indexes: None,
                },
                PackageRecord {
                    name: "Torah".to_string(),
                    localized_name: "torah".to_string(),
                    color: "Blue".to_string(),
                    size: 3,
                    parent: None,
                    indexes: Some(vec![
                        "Genesis".to_string(),
                        "Exodus".to_string(),
                        "Leviticus".to_string(),
                    ]),
                },
            ],
            books: books.clone(),
        };
        let mut hierarchy = PackageHierarchy::build(&snapshot).unwrap();
        for package in hierarchy.packages_mut() {
            package.clicked = clicked.contains(&package.name.as_str());
        }
        (books, hierarchy)
    }

    #[test]
    fn nothing_selected_nothing_desired() {
        let (books, hierarchy) = build_hierarchy(&[]);
        let state = project(&books, &hierarchy);

        assert_eq!(state.len(), 4);
        assert!(state.values().all(|b| !b.desired));
    }

    #[test]
    fn selection_marks_only_member_books() {
        let (books, hierarchy) = build_hierarchy(&["Torah"]);
        let state = project(&books, &hierarchy);

        assert!(state["Genesis"].desired);
        assert!(state["Exodus"].desired);
        assert!(!state["Weird Random Book"].desired);
    }

    #[test]
    fn root_selection_marks_everything() {
        let (books, hierarchy) = build_hierarchy(&["COMPLETE LIBRARY"]);
        let state = project(&books, &hierarchy);

        assert!(state.values().all(|b| b.desired));
    }

    #[test]
    fn projection_is_deterministic() {
        let (books, hierarchy) = build_hierarchy(&["Torah"]);
        let first = project(&books, &hierarchy);
        let second = project(&books, &hierarchy);
        assert_eq!(first, second);
    }

    #[test]
    fn desired_titles_filters_flags() {
        let (books, hierarchy) = build_hierarchy(&["Torah"]);
        let state = project(&books, &hierarchy);
        let titles = desired_titles(&state);

        assert_eq!(titles.len(), 3);
        assert!(titles.contains("Genesis"));
        assert!(!titles.contains("Weird Random Book"));
    }
}
