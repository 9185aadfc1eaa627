use serde::Serialize;

/// Lifecycle of a single task process.
///
/// `Pending` and `Running` are the only non-terminal states; a group with any
/// task in one of them is considered active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Admitted but not started yet (an earlier task in the group is running).
    Pending,
    Running,
    /// Exited on its own; `exit_code` is set.
    Exited,
    /// Terminated by a signal; `signal` is set.
    Signaled,
    /// The process could not be spawned; `error` holds the reason.
    FailedToStart,
    /// Never started because the group was killed or an earlier task failed
    /// to start.
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

/// Point-in-time values of one task. No handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub binary: String,
    pub arguments: Vec<String>,
    pub status: TaskStatus,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Point-in-time values of every task in a group, in launch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub id: String,
    pub binary: String,
    pub active: bool,
    pub tasks: Vec<TaskSnapshot>,
}

/// One row of `list`: the group id and its first task, if it has any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub id: String,
    pub first: Option<TaskSnapshot>,
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Accepted,
    /// A group with the same id still has running tasks.
    Rejected,
}

impl LaunchOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, LaunchOutcome::Accepted)
    }
}
