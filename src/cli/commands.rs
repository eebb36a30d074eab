//! Command handlers for the shelf_sync CLI
//!
//! Each handler builds the coordinator from configuration, runs the setup
//! protocol, and performs one user-facing operation.

use tracing::info;
use url::Url;

use crate::app::bundle::{BundleClient, HttpTransport};
use crate::app::coordinator::{SyncCoordinator, BUNDLE_IDENTITY};
use crate::app::selection::SelectionStore;
use crate::app::storage::JsonSettingsStore;
use crate::cli::args::{GlobalArgs, PackageArgs, SyncArgs};
use crate::cli::progress::attach_progress_bar;
use crate::config::AppConfig;
use crate::errors::{AppError, BundleError, Result};

type Coordinator = SyncCoordinator<JsonSettingsStore, HttpTransport>;

/// Build the coordinator from configuration and global flags
async fn build_coordinator(global: &GlobalArgs) -> Result<(Coordinator, AppConfig)> {
    let mut config = AppConfig::load(global.config.clone()).await?;
    if let Some(dir) = &global.library_dir {
        config.library.library_dir = Some(dir.clone());
    }

    let endpoint = Url::parse(&config.api.endpoint).map_err(|_| {
        AppError::Bundle(BundleError::InvalidUrl {
            url: config.api.endpoint.clone(),
        })
    })?;

    let coordinator = SyncCoordinator::new(
        config.sync_config(),
        SelectionStore::new(JsonSettingsStore::default_location()),
        BundleClient::new(HttpTransport::new()?, endpoint, config.bundle_config()),
    );
    Ok((coordinator, config))
}

/// Show selection, pending work, and update-check status
pub async fn handle_status(global: &GlobalArgs) -> Result<()> {
    let (coordinator, _config) = build_coordinator(global).await?;
    let state = coordinator.setup().await?;

    let selected: Vec<_> = state
        .hierarchy
        .packages()
        .iter()
        .filter(|p| p.clicked)
        .map(|p| p.name.as_str())
        .collect();
    if selected.is_empty() {
        println!("No packages selected.");
    } else {
        println!("Selected packages: {}", selected.join(", "));
    }
    if state.reconcile.wrote {
        println!(
            "Corrected persisted selection (pruned: {})",
            state.reconcile.pruned.join(", ")
        );
    }

    let desired = state.books.values().filter(|b| b.desired).count();
    println!("Desired books: {} of {}", desired, state.books.len());

    let plan = coordinator.plan(&state).await?;
    println!(
        "Pending: {} to download, {} to delete",
        plan.to_download.len(),
        plan.to_delete.len()
    );

    if coordinator.update_check_due(&state).await? {
        println!("A staleness re-check is due; run `shelf_sync sync`.");
    }
    Ok(())
}

/// Download missing or stale books and remove unwanted archives
pub async fn handle_sync(args: &SyncArgs, global: &GlobalArgs) -> Result<()> {
    let (coordinator, config) = build_coordinator(global).await?;
    let state = coordinator.setup().await?;
    let plan = coordinator.plan(&state).await?;

    if plan.is_empty() {
        println!("Everything up to date.");
        coordinator.record_update_check().await?;
        return Ok(());
    }

    println!(
        "{} to download, {} to delete",
        plan.to_download.len(),
        plan.to_delete.len()
    );
    if args.dry_run {
        for title in &plan.to_download {
            println!("  + {}", title);
        }
        for title in &plan.to_delete {
            println!("  - {}", title);
        }
        return Ok(());
    }

    let bar = attach_progress_bar(
        coordinator.tracker(),
        BUNDLE_IDENTITY,
        config.throttle_config(),
    );
    let report = coordinator.execute(&plan).await;
    coordinator.tracker().remove(BUNDLE_IDENTITY);

    match report {
        Ok(report) => {
            bar.finish_and_clear();
            println!(
                "Fetched {} books ({} bytes), deleted {} archives.",
                report.downloaded.len(),
                report.archive_bytes,
                report.deleted.len()
            );
            coordinator.record_update_check().await?;
            Ok(())
        }
        Err(e) => {
            info!("Sync failed: {}", e);
            Err(e)
        }
    }
}

/// List catalog packages with their selection state
pub async fn handle_packages(global: &GlobalArgs) -> Result<()> {
    let (coordinator, _config) = build_coordinator(global).await?;
    let state = coordinator.setup().await?;

    for package in state.hierarchy.packages() {
        let marker = if package.clicked {
            "[x]"
        } else if package.superseded_by_parent {
            "[^]"
        } else {
            "[ ]"
        };
        println!(
            "{} {} ({}, {} books)",
            marker,
            package.name,
            package.localized_name,
            package.books().len()
        );
    }
    println!("\n[x] selected   [^] covered by a selected ancestor");
    Ok(())
}

/// Record an explicit package choice
pub async fn handle_select(args: &PackageArgs, global: &GlobalArgs, selected: bool) -> Result<()> {
    let (coordinator, _config) = build_coordinator(global).await?;
    let state = coordinator.setup().await?;

    coordinator
        .selection()
        .set_selected(&state.hierarchy, &args.name, selected)
        .await?;

    // Re-run setup so the printed summary reflects the reconciled choice.
    let state = coordinator.setup().await?;
    let desired = state.books.values().filter(|b| b.desired).count();
    println!(
        "{} {}. Desired books now: {}.",
        if selected { "Selected" } else { "Deselected" },
        args.name,
        desired
    );
    println!("Run `shelf_sync sync` to apply the change to disk.");
    Ok(())
}

/// Report whether a periodic staleness check is due
pub async fn handle_check(global: &GlobalArgs) -> Result<()> {
    let (coordinator, _config) = build_coordinator(global).await?;
    let state = coordinator.setup().await?;

    if coordinator.update_check_due(&state).await? {
        println!("Update check due.");
    } else {
        println!("No update check needed.");
    }
    Ok(())
}
