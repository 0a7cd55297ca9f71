//! Errors - エラー型と分類
//!
//! スケジューラの操作が返すエラーは 3 種類だけです。
//! いずれもプロセスにとって致命的ではなく、呼び出し側が 4xx 相当として扱います。

use thiserror::Error;

use super::ids::TaskId;
use super::state::TaskStatus;

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// ErrorKind は API 層でのマッピング用の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    GuardViolation,
    Validation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The operation referenced an unknown task id.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The operation requested a transition the state machine does not allow.
    #[error("cannot {operation} task {task_id} while it is {status}")]
    GuardViolation {
        task_id: TaskId,
        operation: &'static str,
        status: TaskStatus,
    },

    /// Malformed input.
    #[error("validation error: {0}")]
    Validation(String),
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::NotFound(_) => ErrorKind::NotFound,
            SchedulerError::GuardViolation { .. } => ErrorKind::GuardViolation,
            SchedulerError::Validation(_) => ErrorKind::Validation,
        }
    }

    pub(crate) fn guard(task_id: TaskId, operation: &'static str, status: TaskStatus) -> Self {
        SchedulerError::GuardViolation {
            task_id,
            operation,
            status,
        }
    }
}
