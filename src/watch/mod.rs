// src/watch/mod.rs

//! Directory watching.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform filesystem watcher (`notify`) per directory.
//! - Re-enumerating the directory into a [`DirNode`] tree after each burst of
//!   changes and pushing it to whoever asked for the watch.
//! - (Optionally) fingerprinting trees to skip pushes that change nothing.
//!
//! It does **not** know about processes or the transport.

pub mod hash;
pub mod patterns;
pub mod registry;
pub mod tree;
pub mod watcher;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::config::ConfigFile;
use crate::config::model::DEFAULT_DEBOUNCE_MS;

pub use hash::tree_fingerprint;
pub use patterns::{build_globset, ExcludeMatcher};
pub use registry::DirWatchRegistry;
pub use tree::{scan_tree, DirNode, NodeKind};
pub use watcher::{spawn_dir_watcher, WatcherHandle};

/// A fresh snapshot of a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirUpdate {
    /// The path the watch was requested for.
    pub path: PathBuf,
    pub tree: DirNode,
}

/// Runtime knobs for directory watches, derived from `[watch]`.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub exclude: ExcludeMatcher,
    pub debounce: Duration,
    pub skip_unchanged: bool,
}

impl WatchSettings {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Ok(Self {
            exclude: ExcludeMatcher::new(&cfg.watch.exclude)?,
            debounce: Duration::from_millis(cfg.watch.debounce_ms),
            skip_unchanged: cfg.watch.skip_unchanged,
        })
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            exclude: ExcludeMatcher::default(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            skip_unchanged: false,
        }
    }
}
