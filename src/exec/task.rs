// src/exec/task.rs

//! A single child process and its captured output.

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{ProchubError, Result};
use crate::exec::buffer::ReplayBuffer;
use crate::types::{TaskSnapshot, TaskStatus};

/// Read size for the stdout/stderr pumps.
const PUMP_CHUNK: usize = 8 * 1024;

/// How long to wait for the output pipes to reach EOF after the process has
/// exited. A grandchild that inherited the pipes can keep them open forever.
const PUMP_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// How a task process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskExit {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
}

#[derive(Debug, Clone)]
struct TaskRecord {
    status: TaskStatus,
    pid: Option<u32>,
    exit_code: Option<i32>,
    signal: Option<i32>,
    error: Option<String>,
}

/// One process in a [`TaskGroup`](crate::exec::TaskGroup).
///
/// State is behind a mutex so the registry can answer queries while the
/// launch sequence and the supervisor update it.
#[derive(Debug)]
pub struct Task {
    binary: String,
    arguments: Vec<String>,
    record: Mutex<TaskRecord>,
    output: OnceLock<ReplayBuffer>,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
}

/// Returned by [`Task::start`]; resolves once when the process has exited and
/// its output has been drained.
#[derive(Debug)]
pub struct RunningTask {
    pid: Option<u32>,
    exited: oneshot::Receiver<TaskExit>,
}

impl RunningTask {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// `None` if the supervisor went away without reporting (runtime shutdown).
    pub async fn wait(self) -> Option<TaskExit> {
        self.exited.await.ok()
    }
}

impl Task {
    pub fn new(binary: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            arguments,
            record: Mutex::new(TaskRecord {
                status: TaskStatus::Pending,
                pid: None,
                exit_code: None,
                signal: None,
                error: None,
            }),
            output: OnceLock::new(),
            kill_tx: Mutex::new(None),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn status(&self) -> TaskStatus {
        self.record().status
    }

    pub fn pid(&self) -> Option<u32> {
        self.record().pid
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.record().exit_code
    }

    pub fn signal(&self) -> Option<i32> {
        self.record().signal
    }

    /// Output buffer; `None` until the process has been spawned.
    pub fn output(&self) -> Option<&ReplayBuffer> {
        self.output.get()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let record = self.record().clone();
        TaskSnapshot {
            binary: self.binary.clone(),
            arguments: self.arguments.clone(),
            status: record.status,
            pid: record.pid,
            exit_code: record.exit_code,
            signal: record.signal,
            error: record.error,
        }
    }

    /// Spawn the process and start capturing its combined output.
    ///
    /// Returns immediately; await [`RunningTask::wait`] for completion.
    /// Spawn failures are returned as [`ProchubError::ExecutionError`] and
    /// recorded as [`TaskStatus::FailedToStart`].
    pub fn start(self: &Arc<Self>, output_capacity: usize) -> Result<RunningTask> {
        if self.status() != TaskStatus::Pending {
            return Err(ProchubError::Other(anyhow!(
                "task for '{}' was already started",
                self.binary
            )));
        }

        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let mut record = self.record();
                record.status = TaskStatus::FailedToStart;
                record.error = Some(source.to_string());
                drop(record);
                return Err(ProchubError::ExecutionError {
                    binary: self.binary.clone(),
                    source,
                });
            }
        };

        let pid = child.id();
        let buffer = ReplayBuffer::new(output_capacity);
        // Guarded by the Pending check above; a second set cannot happen.
        let _ = self.output.set(buffer.clone());

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        *self.kill_slot() = Some(kill_tx);

        {
            let mut record = self.record();
            record.status = TaskStatus::Running;
            record.pid = pid;
        }

        info!(
            pid,
            binary = %self.binary,
            arguments = %self.arguments.join(" "),
            "spawned child process"
        );

        // stdout and stderr are merged into the same buffer; interleaving
        // between the two pipes is best-effort.
        let pumps: Vec<JoinHandle<()>> = [
            child.stdout.take().map(|out| spawn_pump(out, buffer.clone())),
            child.stderr.take().map(|err| spawn_pump(err, buffer.clone())),
        ]
        .into_iter()
        .flatten()
        .collect();

        let (exited_tx, exited_rx) = oneshot::channel::<TaskExit>();
        let task = Arc::clone(self);

        tokio::spawn(async move {
            let exit = match wait_or_kill(&mut child, kill_rx, pid).await {
                Ok(status) => task.record_exit(status),
                Err(err) => task.record_wait_failure(err),
            };

            for pump in pumps {
                if tokio::time::timeout(PUMP_DRAIN_GRACE, pump).await.is_err() {
                    debug!(pid, "output pipe still open after exit; leaving pump running");
                }
            }
            buffer.close();

            let _ = exited_tx.send(exit);
        });

        Ok(RunningTask {
            pid,
            exited: exited_rx,
        })
    }

    /// Request a forceful kill (SIGKILL on unix).
    ///
    /// Returns `false` when there was nothing to kill: the task never started,
    /// already exited, or was already killed.
    pub fn kill(&self) -> bool {
        match self.kill_slot().take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Mark a task that will never be started.
    pub(crate) fn mark_skipped(&self) {
        let mut record = self.record();
        if record.status == TaskStatus::Pending {
            record.status = TaskStatus::Skipped;
        }
    }

    fn record_exit(&self, status: ExitStatus) -> TaskExit {
        let exit = TaskExit {
            exit_code: status.code(),
            signal: exit_signal(&status),
        };

        let pid = {
            let mut record = self.record();
            record.exit_code = exit.exit_code;
            record.signal = exit.signal;
            record.status = if exit.signal.is_some() {
                TaskStatus::Signaled
            } else {
                TaskStatus::Exited
            };
            record.pid
        };

        info!(pid, exit_code = exit.exit_code, "child process exited");
        if let Some(signal) = exit.signal {
            info!(pid, signal, "child process was terminated by a signal");
        }

        exit
    }

    fn record_wait_failure(&self, err: std::io::Error) -> TaskExit {
        let pid = {
            let mut record = self.record();
            record.status = TaskStatus::Exited;
            record.error = Some(err.to_string());
            record.pid
        };
        warn!(pid, error = %err, "failed to wait for child process");

        TaskExit {
            exit_code: None,
            signal: None,
        }
    }

    fn record(&self) -> MutexGuard<'_, TaskRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn kill_slot(&self) -> MutexGuard<'_, Option<oneshot::Sender<()>>> {
        self.kill_tx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wait for the child, or kill it first if a kill request arrives.
async fn wait_or_kill(
    child: &mut Child,
    kill_rx: oneshot::Receiver<()>,
    pid: Option<u32>,
) -> std::io::Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => status,
        request = kill_rx => {
            if request.is_ok() {
                info!(pid, "kill requested; sending SIGKILL");
                if let Err(err) = child.start_kill() {
                    debug!(pid, error = %err, "kill failed; process already gone");
                }
            }
            child.wait().await
        }
    }
}

/// Copy one output pipe into the shared buffer until EOF.
fn spawn_pump<R>(mut source: R, sink: ReplayBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = vec![0u8; PUMP_CHUNK];
        loop {
            match source.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink.append(&chunk[..n]),
                Err(err) => {
                    debug!(error = %err, "output pipe read failed");
                    break;
                }
            }
        }
    })
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
