//! Events - ドメインイベント
//!
//! 状態遷移が成功するたびに Scheduler が EventSink へ送ります。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ActivityId, TaskId};
use super::state::TaskStatus;
use super::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEventKind {
    Scheduled,
    Updated,
    Started {
        activity_id: ActivityId,
    },
    Completed,
    Failed {
        reason: String,
    },
    Cancelled {
        reason: String,
    },
    RetryScheduled {
        retry_count: u32,
        next_retry: DateTime<Utc>,
    },
}

/// A state change observed on one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub task_id: TaskId,
    /// Status after the change.
    pub status: TaskStatus,
    pub at: DateTime<Utc>,
    pub kind: TaskEventKind,
}

impl TaskEvent {
    /// Build an event from the task as it looks after the change.
    pub fn from_task(task: &Task, kind: TaskEventKind) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            at: task.updated_at,
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            TaskEventKind::Scheduled => "task_scheduled",
            TaskEventKind::Updated => "task_updated",
            TaskEventKind::Started { .. } => "task_started",
            TaskEventKind::Completed => "task_completed",
            TaskEventKind::Failed { .. } => "task_failed",
            TaskEventKind::Cancelled { .. } => "task_cancelled",
            TaskEventKind::RetryScheduled { .. } => "task_retry_scheduled",
        }
    }
}
