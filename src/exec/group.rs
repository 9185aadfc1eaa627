// src/exec/group.rs

//! Ordered set of tasks launched by one request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::exec::task::Task;
use crate::types::{GroupSnapshot, TaskSnapshot};

/// All tasks created by one launch request, keyed by the caller's id.
///
/// Tasks share one binary, each with its own argument list, and run one after
/// another in argument-list order.
#[derive(Debug)]
pub struct TaskGroup {
    id: String,
    binary: String,
    tasks: Vec<Arc<Task>>,
    cancelled: AtomicBool,
}

impl TaskGroup {
    pub fn new(
        id: impl Into<String>,
        binary: impl Into<String>,
        argument_lists: Vec<Vec<String>>,
    ) -> Self {
        let binary = binary.into();
        let tasks = argument_lists
            .into_iter()
            .map(|arguments| Arc::new(Task::new(binary.clone(), arguments)))
            .collect();

        Self {
            id: id.into(),
            binary,
            tasks,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True while any task is pending or running.
    pub fn is_active(&self) -> bool {
        self.tasks.iter().any(|task| !task.status().is_terminal())
    }

    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            id: self.id.clone(),
            binary: self.binary.clone(),
            active: self.is_active(),
            tasks: self.tasks.iter().map(|task| task.snapshot()).collect(),
        }
    }

    pub fn first_snapshot(&self) -> Option<TaskSnapshot> {
        self.tasks.first().map(|task| task.snapshot())
    }

    /// Start the tasks in the background, one at a time.
    ///
    /// Returns immediately. The returned handle resolves once the sequence
    /// has finished; callers normally drop it.
    pub fn launch(self: &Arc<Self>, output_capacity: usize) -> JoinHandle<()> {
        let group = Arc::clone(self);
        tokio::spawn(async move { group.run_sequence(output_capacity).await })
    }

    async fn run_sequence(&self, output_capacity: usize) {
        let mut first_pid: Option<u32> = None;

        for (index, task) in self.tasks.iter().enumerate() {
            if self.is_cancelled() {
                debug!(group = %self.id, "group was killed; not starting remaining tasks");
                break;
            }

            let running = match task.start(output_capacity) {
                Ok(running) => running,
                Err(err) => {
                    error!(
                        group = %self.id,
                        task = index,
                        error = %err,
                        "failed to start child process; halting group"
                    );
                    break;
                }
            };

            match first_pid {
                None => {
                    first_pid = running.pid();
                    info!(group = %self.id, pid = running.pid(), "starting group; first task spawned");
                }
                Some(first) => {
                    info!(
                        group = %self.id,
                        pid = running.pid(),
                        first_pid = first,
                        "spawned next task in group"
                    );
                }
            }

            // A kill that raced with this start missed the new process.
            if self.is_cancelled() {
                task.kill();
            }

            running.wait().await;
        }

        for task in &self.tasks {
            task.mark_skipped();
        }
        debug!(group = %self.id, "launch sequence finished");
    }

    /// Captured output of every task, in task order.
    ///
    /// Each task gets a fresh reader; all are read in parallel and each waits
    /// at most `settle` for a still-running process. Tasks that never started
    /// contribute an empty string.
    pub async fn collect_output(&self, settle: Duration) -> Vec<String> {
        let reads: Vec<JoinHandle<String>> = self
            .tasks
            .iter()
            .map(|task| {
                let buffer = task.output().cloned();
                tokio::spawn(async move {
                    match buffer {
                        Some(buffer) => buffer.rewind().read_to_string(settle).await,
                        None => String::new(),
                    }
                })
            })
            .collect();

        let mut outputs = Vec::with_capacity(reads.len());
        for read in reads {
            outputs.push(read.await.unwrap_or_default());
        }
        outputs
    }

    /// Kill every started task and stop the sequence from starting more.
    ///
    /// Returns how many processes were signalled.
    pub fn kill(&self) -> usize {
        self.cancelled.store(true, Ordering::SeqCst);
        let signalled = self.tasks.iter().filter(|task| task.kill()).count();
        debug!(group = %self.id, signalled, "kill requested for group");
        signalled
    }
}
