// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::exec::ProcessSettings;

/// Default number of bytes kept per task output buffer (50 MiB).
pub const DEFAULT_OUTPUT_CAPACITY: usize = 50 * 1024 * 1024;

/// Default quiescence window for output reads.
pub const DEFAULT_READ_SETTLE_MS: u64 = 100;

/// Default coalescing window for bursts of filesystem events.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [process]
/// output_capacity = 52428800
/// read_settle_ms = 100
/// fix_permissions = true
///
/// [watch]
/// exclude = [".git/**"]
/// debounce_ms = 50
/// skip_unchanged = false
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub process: ProcessSection,

    #[serde(default)]
    pub watch: WatchSection,
}

/// Validated configuration. Only constructed through
/// `ConfigFile::try_from(RawConfigFile)` (see `validate.rs`) or
/// [`ConfigFile::default`].
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub process: ProcessSection,
    pub watch: WatchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(process: ProcessSection, watch: WatchSection) -> Self {
        Self { process, watch }
    }

    /// Runtime settings for the process registry.
    pub fn process_settings(&self) -> ProcessSettings {
        ProcessSettings {
            output_capacity: self.process.output_capacity,
            read_settle: Duration::from_millis(self.process.read_settle_ms),
            fix_permissions: self.process.fix_permissions,
        }
    }
}

/// `[process]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSection {
    /// Bytes of combined stdout/stderr kept per task. Older output is
    /// discarded once this is exceeded.
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,

    /// How long an output read waits for a still-running task before
    /// returning what it has.
    #[serde(default = "default_read_settle_ms")]
    pub read_settle_ms: u64,

    /// Add the user execute bit to a binary that lacks it before launching.
    #[serde(default = "default_true")]
    pub fix_permissions: bool,
}

impl Default for ProcessSection {
    fn default() -> Self {
        Self {
            output_capacity: default_output_capacity(),
            read_settle_ms: default_read_settle_ms(),
            fix_permissions: true,
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Glob patterns, relative to the watched directory, left out of tree
    /// snapshots. Events that only touch excluded paths are ignored.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Only push a snapshot when the tree differs from the last one pushed.
    #[serde(default)]
    pub skip_unchanged: bool,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            debounce_ms: default_debounce_ms(),
            skip_unchanged: false,
        }
    }
}

fn default_output_capacity() -> usize {
    DEFAULT_OUTPUT_CAPACITY
}

fn default_read_settle_ms() -> u64 {
    DEFAULT_READ_SETTLE_MS
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_true() -> bool {
    true
}
