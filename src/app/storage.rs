//! Persistent key-value settings storage
//!
//! The sync engine keeps a small amount of state (selected packages, last
//! update check) in a key-value store. The store is a trait so tests and
//! alternative platforms can supply their own backing; the default
//! implementation persists a flat string map as a single JSON file under the
//! platform configuration directory.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{StorageError, StorageResult};

/// Key-value persistence consumed by the sync engine
///
/// Implementations must tolerate concurrent readers; writers are serialized
/// by the callers that own the corresponding critical sections.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a value, `None` if the key has never been set
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, creating or replacing the key
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove every stored key
    async fn clear(&self) -> StorageResult<()>;
}

/// File-backed settings store
///
/// All keys live in one JSON object on disk. Reads load the whole map;
/// writes rewrite the whole file. The map is small (a handful of keys), so
/// this keeps the on-disk format trivially inspectable.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonSettingsStore {
    /// Create a store persisting to the given file path
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Create a store at the default platform location
    ///
    /// Resolves to `<config_dir>/shelf-sync/settings.json`, falling back to
    /// the current directory when the platform has no config dir.
    pub fn default_location() -> Self {
        let path = dirs::config_dir()
            .map(|dir| dir.join("shelf-sync").join("settings.json"))
            .unwrap_or_else(|| PathBuf::from("./settings.json"));
        Self::new(path)
    }

    async fn read_map(&self) -> StorageResult<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| StorageError::Malformed {
                    key: "*".to_string(),
                    source,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::Unavailable(e)),
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StorageError::Unavailable)?;
        }
        let content = serde_json::to_string_pretty(map).map_err(|source| {
            StorageError::Malformed {
                key: "*".to_string(),
                source,
            }
        })?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(StorageError::Unavailable)
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map).await?;
        debug!("Persisted settings key: {}", key);
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Unavailable(e)),
        }
    }
}

/// In-memory settings store for tests
///
/// Counts `set` calls so tests can assert on the conditional write-back
/// contract of the selection store without a filesystem.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    map: Mutex<BTreeMap<String, String>>,
    writes: AtomicU64,
}

impl MemorySettingsStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls observed since creation
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.map.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.map
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.map.lock().await.clear();
        Ok(())
    }
}
