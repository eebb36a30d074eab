//! Package hierarchy resolution
//!
//! The manifest is a flat list of package records; containment between their
//! book sets implies a forest. Packages are stored in an arena indexed by
//! declaration order, with parent links as arena indices, so the structure
//! stays serializable and cycles are cheap to detect.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::app::catalog::{CatalogSnapshot, PackageRecord};
use crate::errors::{HierarchyError, HierarchyResult};

/// A resolved package in the hierarchy
#[derive(Debug, Clone)]
pub struct Package {
    /// Stable package identifier
    pub name: String,

    /// Localized display name
    pub localized_name: String,

    /// Color tag for the presentation layer
    pub color: String,

    /// Server-estimated download size
    pub size_estimate: u64,

    /// Arena index of the resolved parent, if any
    parent: Option<usize>,

    /// Effective book set, resolved at build time
    books: BTreeSet<String>,

    /// Whether this package denotes the entire library
    is_library_root: bool,

    /// Explicitly selected by the user (post-reconciliation)
    pub clicked: bool,

    /// An ancestor is also selected, making this selection redundant
    pub superseded_by_parent: bool,
}

impl Package {
    /// Effective book set of this package
    pub fn books(&self) -> &BTreeSet<String> {
        &self.books
    }

    /// Whether this package stands for every book in the library
    pub fn is_library_root(&self) -> bool {
        self.is_library_root
    }
}

/// Arena of packages with resolved parent links
///
/// Build once at setup from the catalog snapshot; lookups are by name.
#[derive(Debug, Clone)]
pub struct PackageHierarchy {
    packages: Vec<Package>,
    index: HashMap<String, usize>,
}

impl PackageHierarchy {
    /// Build the hierarchy from a catalog snapshot
    ///
    /// Effective book sets are resolved first (explicit `indexes`, or the
    /// full catalog book list for a record without one), then parents:
    /// explicit parent names are used verbatim; otherwise the parent is the
    /// package with the smallest effective book set that strictly contains
    /// this one, earliest declaration winning ties. A cycle or an explicit
    /// parent naming no known package is a corrupt manifest and aborts
    /// setup.
    pub fn build(snapshot: &CatalogSnapshot) -> HierarchyResult<Self> {
        let full_set: BTreeSet<String> = snapshot.books.iter().cloned().collect();

        let mut packages: Vec<Package> = Vec::with_capacity(snapshot.packages.len());
        let mut index = HashMap::with_capacity(snapshot.packages.len());

        for (i, record) in snapshot.packages.iter().enumerate() {
            let (books, is_library_root) = match &record.indexes {
                Some(titles) => (titles.iter().cloned().collect::<BTreeSet<_>>(), false),
                None => (full_set.clone(), true),
            };
            if books.is_empty() {
                warn!("Package {} has an empty book set", record.name);
            }
            packages.push(Package {
                name: record.name.clone(),
                localized_name: record.localized_name.clone(),
                color: record.color.clone(),
                size_estimate: record.size,
                parent: None,
                books,
                is_library_root,
                clicked: false,
                superseded_by_parent: false,
            });
            index.insert(record.name.clone(), i);
        }

        for (i, record) in snapshot.packages.iter().enumerate() {
            let parent = resolve_parent(i, record, &packages, &index)?;
            packages[i].parent = parent;
        }

        let hierarchy = Self { packages, index };
        hierarchy.check_acyclic()?;

        debug!("Resolved hierarchy of {} packages", hierarchy.packages.len());
        Ok(hierarchy)
    }

    /// Look up a package by name
    pub fn get(&self, name: &str) -> HierarchyResult<&Package> {
        self.index
            .get(name)
            .map(|&i| &self.packages[i])
            .ok_or_else(|| HierarchyError::UnknownPackage {
                name: name.to_string(),
            })
    }

    /// Resolved parent of a package, if any
    pub fn parent_of(&self, name: &str) -> HierarchyResult<Option<&Package>> {
        let package = self.get(name)?;
        Ok(package.parent.map(|i| &self.packages[i]))
    }

    /// Names of the ancestors of a package, nearest first
    pub fn ancestors(&self, name: &str) -> HierarchyResult<Vec<&Package>> {
        let mut chain = Vec::new();
        let mut current = self.get(name)?.parent;
        while let Some(i) = current {
            let package = &self.packages[i];
            chain.push(package);
            current = package.parent;
        }
        Ok(chain)
    }

    /// All packages in declaration order
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Mutable access for the reconciliation pass
    pub(crate) fn packages_mut(&mut self) -> &mut [Package] {
        &mut self.packages
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the hierarchy holds no packages
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Whether any package is currently selected
    pub fn any_selected(&self) -> bool {
        self.packages.iter().any(|p| p.clicked)
    }

    fn check_acyclic(&self) -> HierarchyResult<()> {
        for start in 0..self.packages.len() {
            let mut current = self.packages[start].parent;
            let mut steps = 0;
            while let Some(i) = current {
                steps += 1;
                if steps > self.packages.len() {
                    return Err(HierarchyError::InvalidHierarchy {
                        reason: format!(
                            "parent cycle through package {}",
                            self.packages[start].name
                        ),
                    });
                }
                current = self.packages[i].parent;
            }
        }
        Ok(())
    }
}

/// Resolve the parent index for one package record
///
/// Containment inference picks the smallest strict superset rather than the
/// absolute root, so the forest stays minimal and non-redundant.
fn resolve_parent(
    i: usize,
    record: &PackageRecord,
    packages: &[Package],
    index: &HashMap<String, usize>,
) -> HierarchyResult<Option<usize>> {
    if let Some(parent_name) = &record.parent {
        let &parent_idx =
            index
                .get(parent_name)
                .ok_or_else(|| HierarchyError::InvalidHierarchy {
                    reason: format!(
                        "package {} names unknown parent {}",
                        record.name, parent_name
                    ),
                })?;
        return Ok(Some(parent_idx));
    }

    let own = &packages[i].books;
    let mut best: Option<usize> = None;
    for (j, candidate) in packages.iter().enumerate() {
        if j == i {
            continue;
        }
        let is_strict_superset = candidate.books.len() > own.len() && own.is_subset(&candidate.books);
        if !is_strict_superset {
            continue;
        }
        // Strict < keeps the earliest declaration among equally-small candidates.
        match best {
            Some(b) if packages[b].books.len() <= candidate.books.len() => {}
            _ => best = Some(j),
        }
    }
    Ok(best)
}
