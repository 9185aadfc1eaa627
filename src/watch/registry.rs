// src/watch/registry.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::watcher::{spawn_dir_watcher, WatcherHandle};
use crate::watch::{DirUpdate, WatchSettings};

/// Map from watched directory to its active watch.
///
/// Watching is best-effort: failures are logged and reported as `false`, but
/// callers are expected to acknowledge the request either way.
#[derive(Debug, Clone)]
pub struct DirWatchRegistry {
    watches: Arc<Mutex<HashMap<PathBuf, WatcherHandle>>>,
    fs: Arc<dyn FileSystem>,
    settings: WatchSettings,
}

impl DirWatchRegistry {
    pub fn new(settings: WatchSettings) -> Self {
        Self::with_fs(settings, Arc::new(RealFileSystem))
    }

    pub fn with_fs(settings: WatchSettings, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            watches: Arc::new(Mutex::new(HashMap::new())),
            fs,
            settings,
        }
    }

    /// Start watching `path`, pushing snapshots into `sink`.
    ///
    /// Watching a path that is already watched replaces the previous watch.
    /// Returns whether the watch was established.
    pub fn watch(&self, path: impl Into<PathBuf>, sink: mpsc::Sender<DirUpdate>) -> bool {
        let path = path.into();

        match spawn_dir_watcher(path.clone(), Arc::clone(&self.fs), self.settings.clone(), sink) {
            Ok(handle) => {
                if self.watches().insert(path.clone(), handle).is_some() {
                    debug!(path = ?path, "replaced existing directory watch");
                }
                info!(path = ?path, "watching directory");
                true
            }
            Err(err) => {
                warn!(path = ?path, error = %format!("{err:#}"), "failed to watch directory");
                false
            }
        }
    }

    /// Stop watching `path`. Returns `false` if it was not watched.
    pub fn clear(&self, path: &Path) -> bool {
        match self.watches().remove(path) {
            Some(_handle) => {
                info!(path = ?path, "directory watch cleared");
                true
            }
            None => {
                debug!(path = ?path, "clear requested for unwatched directory");
                false
            }
        }
    }

    pub fn clear_all(&self) {
        let cleared = self.watches().drain().count();
        info!(cleared, "all directory watches cleared");
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watches().contains_key(path)
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.watches().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn watches(&self) -> MutexGuard<'_, HashMap<PathBuf, WatcherHandle>> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
