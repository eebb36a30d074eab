//! Configuration management for shelf_sync
//!
//! Unified TOML configuration with multi-source loading and zero-config
//! defaults: with no file at all the application runs against the platform
//! data directory and the public library endpoint.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::bundle::BundleRequestConfig;
use crate::app::coordinator::SyncConfig;
use crate::app::progress::ThrottleConfig;
use crate::constants::{bundle, progress};
use crate::errors::{ConfigError, Result};

/// Application configuration, TOML-shaped
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Library and download directories
    #[serde(default)]
    pub library: LibraryConfig,

    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Bundle request protocol settings
    #[serde(default)]
    pub bundle: BundleConfigToml,

    /// Progress throttling settings
    #[serde(default)]
    pub progress: ProgressConfigToml,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Directory layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory holding catalog files; platform data dir when unset
    pub library_dir: Option<PathBuf>,

    /// Directory holding book archives; defaults to the library directory
    pub download_dir: Option<PathBuf>,
}

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bundle assembly endpoint
    pub endpoint: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: bundle::DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// Bundle protocol settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfigToml {
    /// Total attempts (initial request plus polls)
    pub max_attempts: u32,

    /// Pause between polls, e.g. "3s"
    #[serde(with = "humantime_serde")]
    pub poll_delay: Duration,
}

impl Default for BundleConfigToml {
    fn default() -> Self {
        Self {
            max_attempts: bundle::MAX_ATTEMPTS,
            poll_delay: bundle::POLL_DELAY,
        }
    }
}

/// Progress throttling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfigToml {
    /// Maximum callback invocations per download
    pub callback_count: u32,

    /// Minimum spacing between callbacks, e.g. "250ms"
    #[serde(with = "humantime_serde")]
    pub callback_interval: Duration,
}

impl Default for ProgressConfigToml {
    fn default() -> Self {
        Self {
            callback_count: progress::DEFAULT_CALLBACK_COUNT,
            callback_interval: progress::DEFAULT_CALLBACK_INTERVAL,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// Precedence: explicit path (must exist), then `./shelf-sync.toml`,
    /// then the user config dir; defaults when none is found.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file()?,
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Resolve the runtime sync configuration
    pub fn sync_config(&self) -> SyncConfig {
        let library_dir = self
            .library
            .library_dir
            .clone()
            .unwrap_or_else(default_library_dir);
        let download_dir = self
            .library
            .download_dir
            .clone()
            .unwrap_or_else(|| library_dir.clone());
        SyncConfig {
            library_dir,
            download_dir,
        }
    }

    /// Resolve the runtime bundle protocol configuration
    pub fn bundle_config(&self) -> BundleRequestConfig {
        BundleRequestConfig {
            max_attempts: self.bundle.max_attempts,
            poll_delay: self.bundle.poll_delay,
        }
    }

    /// Resolve the runtime progress throttling configuration
    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            count: self.progress.callback_count,
            interval: self.progress.callback_interval,
        }
    }

    fn find_config_file() -> Result<Option<PathBuf>> {
        let mut search_paths = vec![PathBuf::from("./shelf-sync.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("shelf-sync").join("config.toml"));
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    async fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(ConfigError::Io)?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::InvalidFormat)?;
        debug!("Loaded configuration from: {}", path.display());
        Ok(config)
    }
}

/// Default library directory under the platform data dir
fn default_library_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("shelf-sync").join("library"))
        .unwrap_or_else(|| PathBuf::from("./library"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_reasonable() {
        let config = AppConfig::default();
        assert_eq!(config.bundle.max_attempts, bundle::MAX_ATTEMPTS);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.api.endpoint, bundle::DEFAULT_ENDPOINT);
    }

    #[test]
    fn download_dir_defaults_to_library_dir() {
        let mut config = AppConfig::default();
        config.library.library_dir = Some(PathBuf::from("/srv/library"));
        let sync = config.sync_config();
        assert_eq!(sync.download_dir, PathBuf::from("/srv/library"));
    }

    #[tokio::test]
    async fn explicit_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = AppConfig::load(Some(temp_dir.path().join("nope.toml"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn partial_file_keeps_defaults_elsewhere() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[bundle]
max_attempts = 9
poll_delay = "1s"

[logging]
level = "debug"
"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load(Some(path)).await.unwrap();
        assert_eq!(config.bundle.max_attempts, 9);
        assert_eq!(config.bundle.poll_delay, Duration::from_secs(1));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.api.endpoint, bundle::DEFAULT_ENDPOINT);
        assert_eq!(
            config.progress.callback_count,
            progress::DEFAULT_CALLBACK_COUNT
        );
    }
}
