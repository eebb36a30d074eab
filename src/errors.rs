//! Error types for shelf_sync
//!
//! This module defines error types for all components of the application.
//! Errors are designed to be actionable and provide clear context for
//! debugging and user feedback.

use std::path::PathBuf;
use thiserror::Error;

/// Catalog loading errors
///
/// The package manifest and table of contents are required structural data:
/// failures here are fatal to setup. Optional local caches (selection,
/// staleness record) degrade to empty values instead of producing errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Required catalog file is missing
    #[error("Catalog file not found: {path}")]
    NotFound { path: PathBuf },

    /// JSON parsing error in a required catalog file
    #[error("Invalid catalog JSON in {path}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// I/O error reading catalog data
    #[error("I/O error reading catalog data")]
    Io(#[from] std::io::Error),

    /// Table of contents produced no book titles
    #[error("Table of contents contains no book titles")]
    EmptyBookList,
}

/// Package hierarchy errors
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// Lookup of a package name that does not exist in the catalog
    #[error("Unknown package: {name}")]
    UnknownPackage { name: String },

    /// The manifest does not describe a valid package forest
    ///
    /// Covers parent cycles and explicit parents naming no known package.
    /// Fatal: indicates a corrupt manifest, not a transient condition.
    #[error("Invalid package hierarchy: {reason}")]
    InvalidHierarchy { reason: String },
}

/// Persistent settings store errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying storage read or write failed
    ///
    /// Not retried here; retry policy belongs to the caller.
    #[error("Settings storage unavailable")]
    Unavailable(#[from] std::io::Error),

    /// Stored value exists but could not be serialized or deserialized
    #[error("Malformed value for settings key {key}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Bundle request protocol errors
#[derive(Error, Debug)]
pub enum BundleError {
    /// HTTP transport failure
    #[error("Bundle request transport failed")]
    Http(#[from] reqwest::Error),

    /// Invalid bundle endpoint URL
    #[error("Invalid bundle endpoint: {url}")]
    InvalidUrl { url: String },

    /// The server never produced a ready bundle within the attempt budget
    ///
    /// `last_status` is the last observed HTTP status, or `None` when the
    /// final attempt failed at the transport level.
    #[error("Bundle unavailable after {attempts} attempts (last status: {last_status:?})")]
    Unavailable {
        attempts: u32,
        last_status: Option<u16>,
    },

    /// The poll loop was cancelled by a shutdown signal between attempts
    #[error("Bundle request cancelled")]
    Cancelled,

    /// The assembled archive could not be fetched
    #[error("Archive fetch failed: HTTP {status}")]
    FetchFailed { status: u16 },

    /// I/O error while writing the downloaded archive
    #[error("Archive write failed")]
    Io(#[from] std::io::Error),

    /// Atomic rename of the finished archive failed
    #[error("Atomic archive rename failed: {temp_path} -> {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// I/O error reading configuration
    #[error("I/O error reading configuration")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any component error
#[derive(Error, Debug)]
pub enum AppError {
    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Hierarchy error
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Bundle error
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Storage(_) => true,
            AppError::Bundle(BundleError::Http(_))
            | AppError::Bundle(BundleError::Unavailable { .. }) => true,

            AppError::Catalog(_)
            | AppError::Hierarchy(_)
            | AppError::Config(_)
            | AppError::Bundle(_)
            | AppError::Io(_)
            | AppError::Generic { .. } => false,
        }
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Catalog(_) => "catalog",
            AppError::Hierarchy(_) => "hierarchy",
            AppError::Storage(_) => "storage",
            AppError::Bundle(_) => "bundle",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Hierarchy result type alias
pub type HierarchyResult<T> = std::result::Result<T, HierarchyError>;

/// Storage result type alias
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Bundle result type alias
pub type BundleResult<T> = std::result::Result<T, BundleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_package_is_not_recoverable() {
        let err = AppError::Hierarchy(HierarchyError::UnknownPackage {
            name: "Mystery Shelf".to_string(),
        });
        assert_eq!(err.category(), "hierarchy");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn bundle_unavailable_is_recoverable() {
        let err = AppError::Bundle(BundleError::Unavailable {
            attempts: 5,
            last_status: Some(202),
        });
        assert_eq!(err.category(), "bundle");
        assert!(err.is_recoverable());
    }
}
