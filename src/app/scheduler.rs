//! Periodic update-check gating
//!
//! Downloaded books go stale as the server re-publishes them. Re-checking
//! on every launch would hammer the server for nothing, so a check is only
//! due once the persisted last-check timestamp falls behind by more than
//! `update::CHECK_INTERVAL`. The check itself (scan, staleness load, diff)
//! is the caller's job, as is recording the new timestamp after acting on a
//! positive answer.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::app::hierarchy::PackageHierarchy;
use crate::app::storage::SettingsStore;
use crate::constants::{storage_keys, update};
use crate::errors::StorageResult;

/// Whether a staleness re-check is due
///
/// Unconditionally false when no package is selected; with nothing chosen
/// there is nothing to keep fresh. A missing or unreadable timestamp counts
/// as due: a fresh install with a selection should check immediately.
pub async fn auto_update_check<S: SettingsStore>(
    hierarchy: &PackageHierarchy,
    store: &S,
) -> StorageResult<bool> {
    auto_update_check_at(hierarchy, store, Utc::now()).await
}

/// Time-injected variant of [`auto_update_check`] for tests
pub async fn auto_update_check_at<S: SettingsStore>(
    hierarchy: &PackageHierarchy,
    store: &S,
    now: DateTime<Utc>,
) -> StorageResult<bool> {
    if !hierarchy.any_selected() {
        debug!("No package selected, skipping update check");
        return Ok(false);
    }

    let Some(raw) = store.get(storage_keys::LAST_UPDATE_CHECK).await? else {
        debug!("No previous update check recorded, check is due");
        return Ok(true);
    };

    match raw.parse::<DateTime<Utc>>() {
        Ok(last_check) => {
            let elapsed = (now - last_check)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            Ok(elapsed > update::CHECK_INTERVAL)
        }
        Err(e) => {
            debug!("Unreadable last-check timestamp ({}), check is due", e);
            Ok(true)
        }
    }
}

/// Record that a staleness check ran now
pub async fn record_update_check<S: SettingsStore>(store: &S) -> StorageResult<()> {
    record_update_check_at(store, Utc::now()).await
}

/// Time-injected variant of [`record_update_check`] for tests
pub async fn record_update_check_at<S: SettingsStore>(
    store: &S,
    now: DateTime<Utc>,
) -> StorageResult<()> {
    store
        .set(storage_keys::LAST_UPDATE_CHECK, &now.to_rfc3339())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::catalog::{CatalogSnapshot, PackageRecord};
    use crate::app::storage::MemorySettingsStore;
    use chrono::Duration;

    fn hierarchy(selected: bool) -> PackageHierarchy {
        let snapshot = CatalogSnapshot {
            packages: vec![PackageRecord {
                name: "COMPLETE LIBRARY".to_string(),
                localized_name: "everything".to_string(),
                color: "Other".to_string(),
                size: 10,
                parent: None,
                indexes: None,
            }],
            books: vec!["Genesis".to_string()],
        };
        let mut hierarchy = PackageHierarchy::build(&snapshot).unwrap();
        if selected {
            hierarchy.packages_mut()[0].clicked = true;
        }
        hierarchy
    }

    #[tokio::test]
    async fn no_selection_is_never_due() {
        let store = MemorySettingsStore::new();
        // Even a decade-old timestamp does not matter without a selection.
        record_update_check_at(&store, Utc::now() - Duration::days(3650))
            .await
            .unwrap();
        let due = auto_update_check(&hierarchy(false), &store).await.unwrap();
        assert!(!due);
    }

    #[tokio::test]
    async fn missing_timestamp_is_due() {
        let store = MemorySettingsStore::new();
        let due = auto_update_check(&hierarchy(true), &store).await.unwrap();
        assert!(due);
    }

    #[tokio::test]
    async fn recent_check_is_not_due() {
        let store = MemorySettingsStore::new();
        record_update_check_at(&store, Utc::now() - Duration::days(1))
            .await
            .unwrap();
        let due = auto_update_check(&hierarchy(true), &store).await.unwrap();
        assert!(!due);
    }

    #[tokio::test]
    async fn old_check_is_due() {
        let store = MemorySettingsStore::new();
        record_update_check_at(&store, Utc::now() - Duration::days(10))
            .await
            .unwrap();
        let due = auto_update_check(&hierarchy(true), &store).await.unwrap();
        assert!(due);
    }

    #[tokio::test]
    async fn unreadable_timestamp_is_due() {
        let store = MemorySettingsStore::new();
        store
            .set(storage_keys::LAST_UPDATE_CHECK, "last tuesday")
            .await
            .unwrap();
        let due = auto_update_check(&hierarchy(true), &store).await.unwrap();
        assert!(due);
    }
}
