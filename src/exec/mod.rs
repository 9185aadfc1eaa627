// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`buffer`] holds the bounded, rewindable output buffer.
//! - [`task`] spawns and supervises a single child process.
//! - [`group`] runs the tasks of one launch request in order.
//! - [`preflight`] checks (and fixes) the executable bit of a binary.
//! - [`registry`] maps caller ids to groups and enforces admission control.

pub mod buffer;
pub mod group;
pub mod preflight;
pub mod registry;
pub mod task;

use std::time::Duration;

use crate::config::model::{DEFAULT_OUTPUT_CAPACITY, DEFAULT_READ_SETTLE_MS};

pub use buffer::{ReplayBuffer, ReplayReader};
pub use group::TaskGroup;
pub use preflight::ensure_executable;
pub use registry::ProcessRegistry;
pub use task::{RunningTask, Task, TaskExit};

/// Runtime knobs for the process registry, derived from `[process]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSettings {
    /// Bytes of output kept per task.
    pub output_capacity: usize,
    /// Quiescence window for output reads.
    pub read_settle: Duration,
    /// Add the user execute bit to non-executable binaries.
    pub fix_permissions: bool,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            read_settle: Duration::from_millis(DEFAULT_READ_SETTLE_MS),
            fix_permissions: true,
        }
    }
}
