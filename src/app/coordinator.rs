//! Sync orchestration
//!
//! Ties the components into the three flows the application runs: the setup
//! protocol (catalog → hierarchy → selection → projection), plan building
//! (local scan and staleness load in parallel, then the diff), and plan
//! execution (bundle request, archive download with progress, deletions).
//! Setup must complete before any plan is built; plans are immutable
//! snapshots, so callers can inspect them (dry run) before executing.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::app::books::{self, BooksState};
use crate::app::bundle::{BundleClient, BundleTransport};
use crate::app::catalog::{self, CatalogSnapshot};
use crate::app::diff;
use crate::app::hierarchy::PackageHierarchy;
use crate::app::progress::ProgressTracker;
use crate::app::scan;
use crate::app::scheduler;
use crate::app::selection::{ReconcileReport, SelectionStore};
use crate::app::storage::SettingsStore;
use crate::constants::files;
use crate::errors::Result;

/// Progress identity used for bundle downloads
pub const BUNDLE_IDENTITY: &str = "bundle";

/// Directories the coordinator works against
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory holding the catalog files (`packages.json`, `toc.json`,
    /// `last_updated.json`)
    pub library_dir: PathBuf,

    /// Directory holding one archive per downloaded book
    pub download_dir: PathBuf,
}

/// Result of the setup protocol
#[derive(Debug, Clone)]
pub struct LibraryState {
    /// Resolved package hierarchy with selection flags applied
    pub hierarchy: PackageHierarchy,

    /// Per-book desired flags for the whole catalog
    pub books: BooksState,

    /// What reconciliation did to the persisted selection
    pub reconcile: ReconcileReport,
}

/// An immutable download/delete plan
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Books to fetch, sorted by title
    pub to_download: Vec<String>,

    /// Local archives to remove, sorted by title
    pub to_delete: Vec<String>,
}

impl SyncPlan {
    /// Whether there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.to_download.is_empty() && self.to_delete.is_empty()
    }
}

/// Outcome of executing a plan
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Books requested in the bundle
    pub downloaded: Vec<String>,

    /// Bytes of the fetched bundle archive
    pub archive_bytes: u64,

    /// Archives removed from disk
    pub deleted: Vec<String>,
}

/// Orchestrates setup, planning, and execution
pub struct SyncCoordinator<S, T> {
    config: SyncConfig,
    selection: SelectionStore<S>,
    bundle: BundleClient<T>,
    tracker: ProgressTracker,
}

impl<S: SettingsStore, T: BundleTransport> SyncCoordinator<S, T> {
    /// Create a coordinator over its collaborators
    pub fn new(config: SyncConfig, selection: SelectionStore<S>, bundle: BundleClient<T>) -> Self {
        Self {
            config,
            selection,
            bundle,
            tracker: ProgressTracker::new(),
        }
    }

    /// Progress tracker for subscribing to download identities
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Selection store for explicit user choices
    pub fn selection(&self) -> &SelectionStore<S> {
        &self.selection
    }

    /// Run the setup protocol
    ///
    /// Loads the catalog, resolves the hierarchy, reconciles the persisted
    /// selection, and projects the desired set. Everything downstream
    /// depends on this state, so failures here are fatal to the session.
    pub async fn setup(&self) -> Result<LibraryState> {
        let snapshot = CatalogSnapshot::load(&self.config.library_dir).await?;
        let mut hierarchy = PackageHierarchy::build(&snapshot)?;
        let reconcile = self.selection.reconcile(&mut hierarchy).await?;
        let books = books::project(&snapshot.books, &hierarchy);

        info!(
            "Setup complete: {} packages, {} books, {} selected",
            hierarchy.len(),
            books.len(),
            reconcile.selected.len()
        );

        Ok(LibraryState {
            hierarchy,
            books,
            reconcile,
        })
    }

    /// Build a download/delete plan from the current local state
    ///
    /// The local scan and the staleness-record load are independent
    /// read-only I/O and run concurrently; the diff itself is pure.
    pub async fn plan(&self, state: &LibraryState) -> Result<SyncPlan> {
        let (local, last_updated) = tokio::join!(
            scan::scan_download_dir(&self.config.download_dir),
            catalog::load_last_updated(&self.config.library_dir),
        );
        let local = local?;

        let plan = SyncPlan {
            to_download: diff::books_to_download(&state.books, &local, &last_updated),
            to_delete: diff::books_to_delete(&state.books, &local),
        };
        debug!(
            "Planned sync: {} to download, {} to delete",
            plan.to_download.len(),
            plan.to_delete.len()
        );
        Ok(plan)
    }

    /// Execute a plan: fetch the bundle, then remove unwanted archives
    ///
    /// The bundle download reports progress under [`BUNDLE_IDENTITY`];
    /// attach a subscriber to the tracker before calling to observe it.
    pub async fn execute(&self, plan: &SyncPlan) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        if !plan.to_download.is_empty() {
            let ticket = self.bundle.request_bundle(&plan.to_download).await?;
            // Staged under a subdirectory so the scanner never mistakes the
            // bundle archive for a book archive.
            let name = ticket
                .bundle
                .rsplit('/')
                .next()
                .filter(|n| !n.is_empty())
                .unwrap_or("bundle.zip")
                .to_string();
            let dest = self.config.download_dir.join("bundles").join(name);
            report.archive_bytes = self
                .bundle
                .download_archive(&ticket, &dest, &self.tracker, BUNDLE_IDENTITY)
                .await?;
            report.downloaded = plan.to_download.clone();
        }

        for title in &plan.to_delete {
            let path = self
                .config
                .download_dir
                .join(format!("{}.{}", title, files::ARCHIVE_EXT));
            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.deleted.push(title.clone()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Archive already gone: {}", path.display());
                }
                Err(e) => {
                    warn!("Could not delete {}: {}", path.display(), e);
                    return Err(e.into());
                }
            }
        }

        info!(
            "Sync executed: {} books fetched, {} archives deleted",
            report.downloaded.len(),
            report.deleted.len()
        );
        Ok(report)
    }

    /// Whether a periodic staleness re-check is due
    pub async fn update_check_due(&self, state: &LibraryState) -> Result<bool> {
        Ok(scheduler::auto_update_check(&state.hierarchy, self.selection.settings()).await?)
    }

    /// Record that a staleness check ran now
    pub async fn record_update_check(&self) -> Result<()> {
        Ok(scheduler::record_update_check(self.selection.settings()).await?)
    }
}
