// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::watch::hash::tree_fingerprint;
use crate::watch::patterns::ExcludeMatcher;
use crate::watch::tree::scan_tree;
use crate::watch::{DirUpdate, WatchSettings};

/// Handle for one directory watch.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle stops
/// the watch and the rescan loop: once `drop` returns, no further update is
/// sent to the sink, even if a rescan was already in progress.
pub struct WatcherHandle {
    root: PathBuf,
    stopped: StopFlag,
    rescan: JoinHandle<()>,
    _inner: RecommendedWatcher,
}

impl WatcherHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        *self.stopped.lock() = true;
        self.rescan.abort();
        debug!(root = ?self.root, "directory watch stopped");
    }
}

/// Set once the handle is dropped. Held across the final hand-off to the
/// sink so a stop and a send never interleave.
#[derive(Clone, Default)]
struct StopFlag(Arc<Mutex<bool>>);

impl StopFlag {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Watch `root` recursively and push a fresh [`DirUpdate`] to `sink` after
/// every burst of changes.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_dir_watcher(
    root: impl Into<PathBuf>,
    fs: Arc<dyn FileSystem>,
    settings: WatchSettings,
    sink: mpsc::Sender<DirUpdate>,
) -> Result<WatcherHandle> {
    let root = root.into();
    if !fs.is_dir(&root) {
        bail!("cannot watch {:?}: not a directory", root);
    }

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Fails only once the rescan loop is gone.
                let _ = event_tx.send(event);
            }
            Err(err) => {
                warn!(error = %err, "directory watch error");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = ?root, "directory watch started");

    let stopped = StopFlag::default();
    let loop_stopped = stopped.clone();
    let loop_root = root.clone();
    let rescan = tokio::spawn(async move {
        let mut last_fingerprint: Option<String> = None;

        while let Some(event) = event_rx.recv().await {
            let mut relevant = is_relevant(&event, &loop_root, &settings.exclude);

            // Coalesce the rest of the burst into one rescan.
            tokio::time::sleep(settings.debounce).await;
            while let Ok(more) = event_rx.try_recv() {
                relevant |= is_relevant(&more, &loop_root, &settings.exclude);
            }

            if !relevant {
                continue;
            }

            let scan = {
                let fs = Arc::clone(&fs);
                let root = loop_root.clone();
                let exclude = settings.exclude.clone();
                tokio::task::spawn_blocking(move || scan_tree(fs.as_ref(), &root, &exclude)).await
            };

            let tree = match scan {
                Ok(Ok(tree)) => tree,
                Ok(Err(err)) => {
                    warn!(root = ?loop_root, error = %format!("{err:#}"), "rescan failed");
                    continue;
                }
                Err(err) => {
                    warn!(root = ?loop_root, error = %err, "rescan task panicked");
                    continue;
                }
            };

            if settings.skip_unchanged {
                let fingerprint = tree_fingerprint(&tree);
                if last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
                    debug!(root = ?loop_root, "tree unchanged; skipping update");
                    continue;
                }
                last_fingerprint = Some(fingerprint);
            }

            debug!(root = ?loop_root, nodes = tree.count(), "pushing directory update");
            let update = DirUpdate {
                path: loop_root.clone(),
                tree,
            };
            let Ok(permit) = sink.reserve().await else {
                debug!(root = ?loop_root, "update receiver gone; stopping rescan loop");
                break;
            };
            {
                let stopped = loop_stopped.lock();
                if *stopped {
                    break;
                }
                permit.send(update);
            }
        }

        debug!(root = ?loop_root, "rescan loop finished");
    });

    Ok(WatcherHandle {
        root,
        stopped,
        rescan,
        _inner: watcher,
    })
}

/// Access events (our own scans open directories) and events that only touch
/// excluded paths do not warrant a rescan.
fn is_relevant(event: &Event, root: &Path, exclude: &ExcludeMatcher) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    if event.paths.is_empty() || exclude.is_empty() {
        return true;
    }
    event
        .paths
        .iter()
        .any(|path| !exclude.is_excluded(root, path))
}
