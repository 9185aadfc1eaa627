// src/exec/registry.rs

//! Id-keyed registry of task groups with admission control.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::group::TaskGroup;
use crate::exec::preflight::ensure_executable;
use crate::exec::ProcessSettings;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::{GroupSnapshot, LaunchOutcome, ListEntry};

/// Map from caller id to the most recent [`TaskGroup`] launched under it.
///
/// At most one group per id is active. A finished group stays queryable
/// until a new launch with the same id replaces it. Cloning shares the map.
///
/// The map lock is never held across an `.await` or filesystem calls; queries
/// read the current state and never wait on in-flight launches.
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    groups: Arc<Mutex<BTreeMap<String, Arc<TaskGroup>>>>,
    fs: Arc<dyn FileSystem>,
    settings: ProcessSettings,
}

impl ProcessRegistry {
    pub fn new(settings: ProcessSettings) -> Self {
        Self::with_fs(settings, Arc::new(RealFileSystem))
    }

    pub fn with_fs(settings: ProcessSettings, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            groups: Arc::new(Mutex::new(BTreeMap::new())),
            fs,
            settings,
        }
    }

    pub fn settings(&self) -> &ProcessSettings {
        &self.settings
    }

    /// Admit and start a new group, or reject it if `id` is still running.
    ///
    /// Must be called from within a Tokio runtime. Returns as soon as the
    /// background launch sequence has been spawned. Fails only with
    /// [`ProchubError::PermissionError`](crate::errors::ProchubError) from the
    /// executable pre-flight.
    pub fn launch(
        &self,
        id: &str,
        binary: &str,
        argument_lists: Vec<Vec<String>>,
    ) -> Result<LaunchOutcome> {
        if self.is_running(id) {
            debug!(group = %id, "launch rejected; group is still running");
            return Ok(LaunchOutcome::Rejected);
        }

        // Filesystem work stays outside the map lock.
        ensure_executable(
            self.fs.as_ref(),
            Path::new(binary),
            self.settings.fix_permissions,
        )?;

        let group = {
            let mut groups = self.groups();

            // A concurrent launch may have won the id since the check above.
            if groups.get(id).is_some_and(|existing| existing.is_active()) {
                debug!(group = %id, "launch rejected; group is still running");
                return Ok(LaunchOutcome::Rejected);
            }

            let group = Arc::new(TaskGroup::new(id, binary, argument_lists));
            groups.insert(id.to_string(), Arc::clone(&group));
            group
        };

        info!(group = %id, binary = %binary, tasks = group.len(), "launch accepted");
        group.launch(self.settings.output_capacity);

        Ok(LaunchOutcome::Accepted)
    }

    /// Every id with a summary of its first task, ordered by id.
    pub fn list(&self) -> Vec<ListEntry> {
        self.groups()
            .iter()
            .map(|(id, group)| ListEntry {
                id: id.clone(),
                first: group.first_snapshot(),
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<GroupSnapshot> {
        self.group(id).map(|group| group.snapshot())
    }

    /// Decoded output of each task in the group, in task order.
    pub async fn get_output(&self, id: &str) -> Option<Vec<String>> {
        let group = self.group(id)?;
        Some(group.collect_output(self.settings.read_settle).await)
    }

    /// Kill every process in the group. Returns `false` for an unknown id.
    pub fn kill(&self, id: &str) -> bool {
        match self.group(id) {
            Some(group) => {
                let signalled = group.kill();
                info!(group = %id, signalled, "kill requested");
                true
            }
            None => false,
        }
    }

    /// Kill every group. Used at teardown.
    pub fn shutdown(&self) {
        let groups: Vec<Arc<TaskGroup>> = self.groups().values().cloned().collect();
        let active = groups.iter().filter(|g| g.is_active()).count();
        for group in groups {
            group.kill();
        }
        info!(active, "process registry shut down");
    }

    /// Whether the group for `id` still has pending or running tasks.
    pub fn is_running(&self, id: &str) -> bool {
        self.group(id).is_some_and(|group| group.is_active())
    }

    pub fn group(&self, id: &str) -> Option<Arc<TaskGroup>> {
        self.groups().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.groups().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups().is_empty()
    }

    fn groups(&self) -> MutexGuard<'_, BTreeMap<String, Arc<TaskGroup>>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
