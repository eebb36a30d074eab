//! Application constants for shelf_sync
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// File names and suffixes inside the library directory
pub mod files {
    /// Package manifest file, refreshed from the server
    pub const PACKAGES_FILE: &str = "packages.json";

    /// Table-of-contents file used to compute the full book list
    pub const TOC_FILE: &str = "toc.json";

    /// Server staleness record: book title -> last-modified timestamp
    pub const LAST_UPDATED_FILE: &str = "last_updated.json";

    /// Extension of a downloaded book archive
    pub const ARCHIVE_EXT: &str = "zip";

    /// Temporary file suffix for atomic download operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";
}

/// Keys in the persistent settings store
pub mod storage_keys {
    /// JSON map of explicitly chosen package names
    pub const PACKAGES_SELECTED: &str = "packagesSelected";

    /// ISO-8601 timestamp of the last staleness check
    pub const LAST_UPDATE_CHECK: &str = "lastUpdateCheck";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "shelf-sync/0.1.0 (Offline Library Client)";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Bundle request protocol configuration
pub mod bundle {
    use super::Duration;

    /// Default API endpoint for bundle assembly requests
    pub const DEFAULT_ENDPOINT: &str = "https://library.example.org/api/bundle";

    /// Total attempts (initial request plus polls) before giving up
    pub const MAX_ATTEMPTS: u32 = 5;

    /// Pause between polls while the server assembles the bundle
    pub const POLL_DELAY: Duration = Duration::from_secs(3);
}

/// Progress reporting and throttling
pub mod progress {
    use super::Duration;

    /// Default maximum callback invocations per download
    pub const DEFAULT_CALLBACK_COUNT: u32 = 100;

    /// Default minimum spacing between callbacks for one identity
    pub const DEFAULT_CALLBACK_INTERVAL: Duration = Duration::from_millis(250);
}

/// Periodic update checking
pub mod update {
    use super::Duration;

    /// How long a selection may go without a staleness re-check
    pub const CHECK_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
}

// Re-export commonly used constants for convenience
pub use bundle::{MAX_ATTEMPTS as BUNDLE_MAX_ATTEMPTS, POLL_DELAY as BUNDLE_POLL_DELAY};
pub use files::{ARCHIVE_EXT, LAST_UPDATED_FILE, PACKAGES_FILE, TOC_FILE};
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use update::CHECK_INTERVAL as UPDATE_CHECK_INTERVAL;
