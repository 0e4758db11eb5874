//! Durable upgrade-state record
//!
//! The record is the checkpoint that lets verification survive the reboot the
//! workflow itself triggers. It is written after the firmware update succeeds
//! and before the reboot is requested, and cleared once verification finishes
//! or the reboot could not be requested at all.
//!
//! `FileStateStore` writes the record as JSON through a temp file that is
//! fsynced and renamed over the target, so a crash at any point leaves either
//! the old record or the new one on disk, never a torn write.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::config::UpgradeConfig;
use crate::error::StateError;
use crate::time::current_time_secs;

/// The persisted upgrade checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRecord {
    /// Verification is owed for `target_version`
    pub in_progress: bool,

    /// Version the completed firmware update installed
    pub target_version: String,

    /// Snapshot the update ran with; resume uses this, never the live config
    pub config: UpgradeConfig,

    /// Unix seconds at which the checkpoint was taken
    #[serde(default)]
    pub started_at: u64,
}

impl UpgradeRecord {
    /// Checkpoint for a firmware update that just completed with `config`
    pub fn begin(config: &UpgradeConfig) -> Self {
        Self {
            in_progress: true,
            target_version: config.desired_version.clone(),
            config: config.clone(),
            started_at: current_time_secs(),
        }
    }
}

/// Storage for the single upgrade record
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Durably replace the stored record
    async fn save(&self, record: &UpgradeRecord) -> Result<(), StateError>;

    /// Load the stored record; `None` when nothing is stored
    async fn load(&self) -> Result<Option<UpgradeRecord>, StateError>;

    /// Remove the stored record. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), StateError>;
}

/// JSON file-backed store
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store backed by `path`. Nothing is touched until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the record file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn write_sync(path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(contents)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;

        // Persist the rename itself
        #[cfg(unix)]
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            File::open(parent)?.sync_all()?;
        }

        Ok(())
    }

    fn read_sync(path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove_sync(path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Run blocking file I/O off the async worker threads
    async fn blocking<T, F>(&self, f: F) -> Result<T, StateError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> io::Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || f(&path))
            .await
            .map_err(|e| self.io_error(io::Error::new(io::ErrorKind::Other, e)))?
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn save(&self, record: &UpgradeRecord) -> Result<(), StateError> {
        let contents = serde_json::to_vec_pretty(record).map_err(StateError::Encode)?;
        self.blocking(move |path| Self::write_sync(path, &contents))
            .await?;
        tracing::debug!(path = ?self.path, target_version = %record.target_version, "Saved upgrade state");
        Ok(())
    }

    async fn load(&self) -> Result<Option<UpgradeRecord>, StateError> {
        let Some(bytes) = self.blocking(Self::read_sync).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StateError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    async fn clear(&self) -> Result<(), StateError> {
        self.blocking(Self::remove_sync).await?;
        tracing::debug!(path = ?self.path, "Cleared upgrade state");
        Ok(())
    }
}

/// In-memory store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    record: Mutex<Option<UpgradeRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `record`
    pub fn with_record(record: UpgradeRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }

    /// Current record without going through the trait
    pub fn peek(&self) -> Option<UpgradeRecord> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, record: &UpgradeRecord) -> Result<(), StateError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<UpgradeRecord>, StateError> {
        Ok(self.peek())
    }

    async fn clear(&self) -> Result<(), StateError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(version: &str) -> UpgradeConfig {
        UpgradeConfig {
            control_target: "localhost:50051".to_string(),
            firmware_source: "/host/images/sonic.bin".to_string(),
            desired_version: version.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_begin_copies_config() {
        let record = UpgradeRecord::begin(&config("1.1.0"));
        assert!(record.in_progress);
        assert_eq!(record.target_version, "1.1.0");
        assert_eq!(record.config.desired_version, "1.1.0");
        assert!(record.started_at > 0);
    }

    #[test]
    fn test_record_json_field_names() {
        let record = UpgradeRecord::begin(&config("1.1.0"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["inProgress"], true);
        assert_eq!(json["targetVersion"], "1.1.0");
        assert_eq!(json["config"]["controlTarget"], "localhost:50051");
    }

    #[test]
    fn test_record_without_started_at_loads() {
        let json = r#"{
            "inProgress": true,
            "targetVersion": "2.0",
            "config": {"controlTarget": "a:1", "firmwareSource": "f", "desiredVersion": "2.0"}
        }"#;
        let record: UpgradeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.started_at, 0);
        assert!(!record.config.ignore_unimplemented);
    }

    #[tokio::test]
    async fn test_file_store_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = FileStateStore::new(&path);

        let record = UpgradeRecord::begin(&config("1.1.0"));
        store.save(&record).await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        // A fresh store instance sees the same record, as after a restart
        let reopened = FileStateStore::new(&path);
        assert_eq!(reopened.load().await.unwrap(), Some(record));

        reopened.clear().await.unwrap();
        assert!(!path.exists());
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json"));
        store.clear().await.unwrap();
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_save_replaces() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json"));
        store.save(&UpgradeRecord::begin(&config("1.0"))).await.unwrap();
        store.save(&UpgradeRecord::begin(&config("2.0"))).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.target_version, "2.0");
    }

    #[tokio::test]
    async fn test_file_store_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = FileStateStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(StateError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStateStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        let record = UpgradeRecord::begin(&config("3.0"));
        store.save(&record).await.unwrap();
        assert_eq!(store.peek(), Some(record));

        store.clear().await.unwrap();
        assert_eq!(store.peek(), None);
    }
}
