//! Selected-package persistence and reconciliation
//!
//! The user's chosen packages are persisted as a JSON map of package name to
//! `true`. Previously saved state can be redundant (a child saved alongside
//! its ancestor) or stale (packages that no longer exist); reconciliation
//! corrects it against the current hierarchy and writes back only when the
//! corrected map differs from what was loaded.

use std::collections::BTreeMap;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app::hierarchy::PackageHierarchy;
use crate::app::storage::SettingsStore;
use crate::constants::storage_keys;
use crate::errors::{Result, StorageResult};

/// Persisted selection: package name -> explicitly chosen
///
/// Only `true` entries are meaningful; an absent name means not selected.
pub type Selection = BTreeMap<String, bool>;

/// Outcome of a reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Packages that remain explicitly selected
    pub selected: Vec<String>,

    /// Redundant entries pruned from the persisted map
    pub pruned: Vec<String>,

    /// Whether a corrective write was issued
    pub wrote: bool,
}

/// Owner of the persisted selection and its only write path
///
/// The compare-and-write of `reconcile` and the read-modify-write of
/// `set_selected` run under one async mutex so concurrent passes cannot
/// interleave.
pub struct SelectionStore<S> {
    store: S,
    write_lock: Mutex<()>,
}

impl<S: SettingsStore> SelectionStore<S> {
    /// Create a selection store over a settings backend
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Access the underlying settings backend
    pub fn settings(&self) -> &S {
        &self.store
    }

    /// Load the persisted selection
    ///
    /// Absent or unparsable state is "nothing selected", not an error: the
    /// reconciliation pass will regenerate a clean map on the next write.
    pub async fn load(&self) -> StorageResult<Selection> {
        let raw = self.store.get(storage_keys::PACKAGES_SELECTED).await?;
        let Some(raw) = raw else {
            return Ok(Selection::new());
        };
        match serde_json::from_str::<Selection>(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!("Malformed persisted selection, treating as empty: {}", e);
                Ok(Selection::new())
            }
        }
    }

    /// Reconcile the persisted selection against the hierarchy
    ///
    /// Marks `clicked` and `superseded_by_parent` on every package and
    /// persists the corrected map iff it differs from the loaded one:
    /// zero writes in the clean case, one corrective write when pruning
    /// occurred.
    pub async fn reconcile(
        &self,
        hierarchy: &mut PackageHierarchy,
    ) -> StorageResult<ReconcileReport> {
        let _guard = self.write_lock.lock().await;

        let loaded = self.load().await?;
        let corrected = minimal_selection(hierarchy, &loaded);

        // Flags are computed against the immutable hierarchy first;
        // ancestor walks and mutation cannot overlap.
        let mut report = ReconcileReport::default();
        let mut flags = Vec::with_capacity(hierarchy.len());
        for package in hierarchy.packages() {
            let was_selected = loaded.get(&package.name).copied().unwrap_or(false);
            let clicked = corrected.contains_key(&package.name);
            let superseded = hierarchy
                .ancestors(&package.name)
                .map(|chain| chain.iter().any(|a| corrected.contains_key(&a.name)))
                .unwrap_or(false);
            flags.push((clicked, superseded));
            if clicked {
                report.selected.push(package.name.clone());
            } else if was_selected {
                report.pruned.push(package.name.clone());
            }
        }
        for (package, (clicked, superseded)) in hierarchy.packages_mut().iter_mut().zip(flags) {
            package.clicked = clicked;
            package.superseded_by_parent = superseded;
        }

        if corrected != loaded {
            let raw = serde_json::to_string(&corrected).map_err(|source| {
                crate::errors::StorageError::Malformed {
                    key: storage_keys::PACKAGES_SELECTED.to_string(),
                    source,
                }
            })?;
            self.store.set(storage_keys::PACKAGES_SELECTED, &raw).await?;
            report.wrote = true;
            info!(
                "Corrected persisted selection, pruned: {:?}",
                report.pruned
            );
        } else {
            debug!("Persisted selection already minimal, no write");
        }

        Ok(report)
    }

    /// Record an explicit user choice and persist it
    ///
    /// Validates the package name against the hierarchy first. The caller
    /// should re-run `reconcile` and re-project afterwards.
    pub async fn set_selected(
        &self,
        hierarchy: &PackageHierarchy,
        name: &str,
        selected: bool,
    ) -> Result<()> {
        hierarchy.get(name)?;
        self.write_choice(name, selected).await?;
        Ok(())
    }

    async fn write_choice(&self, name: &str, selected: bool) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        if selected {
            map.insert(name.to_string(), true);
        } else {
            map.remove(name);
        }
        let raw = serde_json::to_string(&map).map_err(|source| {
            crate::errors::StorageError::Malformed {
                key: storage_keys::PACKAGES_SELECTED.to_string(),
                source,
            }
        })?;
        self.store.set(storage_keys::PACKAGES_SELECTED, &raw).await
    }
}

/// Compute the minimal selection: drop entries whose ancestor is selected
///
/// Entries naming packages unknown to the hierarchy are dropped as well;
/// they are leftovers of an older catalog.
fn minimal_selection(hierarchy: &PackageHierarchy, loaded: &Selection) -> Selection {
    let mut corrected = Selection::new();
    for (name, &selected) in loaded {
        if !selected {
            continue;
        }
        let Ok(ancestors) = hierarchy.ancestors(name) else {
            warn!("Dropping selection of unknown package {}", name);
            continue;
        };
        let superseded = ancestors
            .iter()
            .any(|a| loaded.get(&a.name).copied().unwrap_or(false));
        if !superseded {
            corrected.insert(name.clone(), true);
        }
    }
    corrected
}
