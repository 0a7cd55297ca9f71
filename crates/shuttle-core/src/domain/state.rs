//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status.
///
/// State transitions:
/// - (new) -> Pending
/// - Pending | Scheduled -> Running (dispatch)
/// - Running -> Completed | Failed
/// - Pending | Scheduled -> Cancelled
/// - Failed -> Scheduled (retry, while retries remain)
///
/// `Failed` is terminal unless a retry is scheduled afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, waiting for dispatch.
    Pending,

    /// Waiting for retry (eligible once `next_retry` has passed).
    Scheduled,

    /// Handed to a controller.
    Running,

    Completed,

    Failed,

    /// Removed before dispatch.
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Scheduled,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// No transition ever leaves these states.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Can this task be claimed by `mark_started`?
    pub fn can_start(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Scheduled)
    }

    /// Cancellation only applies before dispatch.
    pub fn can_cancel(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Scheduled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
