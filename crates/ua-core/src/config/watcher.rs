//! File-watching configuration source
//!
//! `ConfigManager` loads the config file once synchronously and then, once
//! `start_watcher` is called, reloads it whenever the filesystem reports a
//! change. The parent directory is watched rather than the file itself so that
//! editors and config-map updates that replace the file by rename are seen.
//!
//! Change detection is by content: the callback fires only when the reloaded
//! upgrade snapshot differs from the previous one. A file that fails to parse
//! is logged and the previous snapshot stays in effect.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{load_config, AgentSettings, ConfigFile, UpgradeConfig};
use crate::error::{ConfigError, WatchError};

/// Quiet period after the last filesystem event before the file is re-read
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Loads and watches the config file
pub struct ConfigManager {
    path: PathBuf,
    current: RwLock<ConfigFile>,
}

impl ConfigManager {
    /// Load the config file for the first time
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let current = load_config(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    /// Path of the watched file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current upgrade snapshot
    pub fn snapshot(&self) -> UpgradeConfig {
        self.read().upgrade.clone()
    }

    /// Current agent settings
    pub fn settings(&self) -> AgentSettings {
        self.read().agent.clone()
    }

    /// Re-read the file.
    ///
    /// Returns the new snapshot if it differs from the previous one.
    pub fn reload(&self) -> Result<Option<UpgradeConfig>, ConfigError> {
        let loaded = load_config(&self.path)?;
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let changed = current.upgrade != loaded.upgrade;
        *current = loaded;

        Ok(changed.then(|| current.upgrade.clone()))
    }

    /// Start watching the file, invoking `on_update` with every changed snapshot.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_watcher<F>(self: &Arc<Self>, on_update: F) -> Result<ConfigWatcher, WatchError>
    where
        F: Fn(UpgradeConfig) + Send + Sync + 'static,
    {
        let dir = self
            .path
            .parent()
            .map(|p| {
                if p.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    p
                }
            })
            .ok_or_else(|| WatchError::NoParent(self.path.clone()))?
            .to_path_buf();

        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver only goes away when the watcher is being stopped
            let _ = tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let manager = Arc::clone(self);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    event = rx.recv() => {
                        let event = match event {
                            Some(Ok(event)) => event,
                            Some(Err(e)) => {
                                tracing::warn!("Error watching config file: {}", e);
                                continue;
                            }
                            None => break,
                        };

                        if !manager.is_relevant(&event) {
                            continue;
                        }

                        // A single save usually arrives as several events
                        // (truncate, write, close); wait for them to settle
                        // so a half-written file is never parsed.
                        while let Ok(Some(_)) = tokio::time::timeout(DEBOUNCE, rx.recv()).await {}

                        match manager.reload() {
                            Ok(Some(snapshot)) => {
                                tracing::info!(
                                    desired_version = %snapshot.desired_version,
                                    "Config file changed"
                                );
                                on_update(snapshot);
                            }
                            Ok(None) => {
                                tracing::debug!("Config file touched, snapshot unchanged");
                            }
                            Err(e) => {
                                tracing::warn!("Error reloading config, keeping previous: {}", e);
                            }
                        }
                    }
                }
            }
            tracing::debug!("Config watcher task exiting");
        });

        tracing::info!("Started watching config file: {:?}", self.path);

        Ok(ConfigWatcher {
            _watcher: watcher,
            cancel,
            task,
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ConfigFile> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a filesystem event may have changed the config file
    fn is_relevant(&self, event: &Event) -> bool {
        match event.kind {
            // Config maps swap a symlinked directory; any creation may matter
            EventKind::Create(_) => true,
            EventKind::Modify(_) => {
                let name = self.path.file_name();
                event.paths.iter().any(|p| p.file_name() == name)
            }
            _ => false,
        }
    }
}

/// Handle of a running config watcher
///
/// Dropping the handle stops filesystem notifications; `stop` additionally
/// waits for the reload task to finish.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Stop watching and wait for the reload task to exit
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}
