//! Core sync engine for shelf_sync
//!
//! This module contains the synchronization engine: catalog ingestion,
//! package-hierarchy resolution, selection reconciliation, desired-set
//! projection, local-state diffing, the bundle request protocol, throttled
//! progress reporting, and the update scheduler.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use url::Url;
//!
//! use shelf_sync::app::{
//!     BundleClient, BundleRequestConfig, HttpTransport, JsonSettingsStore, SelectionStore,
//!     SyncConfig, SyncCoordinator,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig {
//!     library_dir: PathBuf::from("./library"),
//!     download_dir: PathBuf::from("./library"),
//! };
//! let coordinator = SyncCoordinator::new(
//!     config,
//!     SelectionStore::new(JsonSettingsStore::default_location()),
//!     BundleClient::new(
//!         HttpTransport::new()?,
//!         Url::parse("https://library.example.org/api/bundle")?,
//!         BundleRequestConfig::default(),
//!     ),
//! );
//!
//! let state = coordinator.setup().await?;
//! let plan = coordinator.plan(&state).await?;
//! if !plan.is_empty() {
//!     coordinator.execute(&plan).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod books;
pub mod bundle;
pub mod catalog;
pub mod coordinator;
pub mod diff;
pub mod hierarchy;
pub mod progress;
pub mod scan;
pub mod scheduler;
pub mod selection;
pub mod storage;

// Re-export main public API
pub use books::{project, Book, BooksState};
pub use bundle::{
    BundleClient, BundleRequestConfig, BundleTicket, BundleTransport, HttpTransport,
    TransportResponse,
};
pub use catalog::{load_last_updated, CatalogSnapshot, LastUpdated, PackageRecord, TocNode};
pub use coordinator::{
    LibraryState, SyncConfig, SyncCoordinator, SyncPlan, SyncReport, BUNDLE_IDENTITY,
};
pub use diff::{books_to_delete, books_to_download};
pub use hierarchy::{Package, PackageHierarchy};
pub use progress::{ProgressSample, ProgressTracker, ThrottleConfig};
pub use scan::{scan_download_dir, LocalArchive};
pub use scheduler::{auto_update_check, record_update_check};
pub use selection::{ReconcileReport, Selection, SelectionStore};
pub use storage::{JsonSettingsStore, MemorySettingsStore, SettingsStore};
