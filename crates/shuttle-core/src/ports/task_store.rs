//! TaskStore port - Task の正本（source of truth）
//!
//! TaskStore は以下を管理します：
//! - ID の払い出し
//! - 状態遷移（ガード判定と更新を同一ロック内で行う）
//! - 次に dispatch するタスクの選択と、読み取り専用のクエリ・集計
//!
//! # 設計原則
//! - すべての遷移はガード判定に対してアトミック（同時 `start` は片方だけ成功）
//! - 外部 I/O を待たない（永続化は SnapshotStore の責務）

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ActivityId, NewTask, Priority, Result, Task, TaskId, TaskUpdate};
use crate::observability::TaskStats;
use crate::store::{RetryPolicy, TaskFilter};

/// A guarded status change requested by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Start { activity_id: ActivityId },
    Complete,
    Fail { reason: String },
    Cancel { reason: String },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Start { .. } => "start",
            Transition::Complete => "complete",
            Transition::Fail { .. } => "fail",
            Transition::Cancel { .. } => "cancel",
        }
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a pending task with a fresh id. Input is already validated.
    async fn create(
        &self,
        spec: NewTask,
        priority: Priority,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Result<Task>;

    /// `None` for unknown ids.
    async fn get(&self, id: TaskId) -> Option<Task>;

    async fn update(&self, id: TaskId, update: TaskUpdate, now: DateTime<Utc>) -> Result<Task>;

    async fn transition(
        &self,
        id: TaskId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Task>;

    /// `Ok(None)` when the task has no retries left; the task is left untouched.
    async fn schedule_retry(
        &self,
        id: TaskId,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>>;

    /// Most eligible task at `now`, without claiming it.
    async fn next_eligible(&self, now: DateTime<Utc>) -> Option<Task>;

    async fn query(&self, filter: &TaskFilter) -> Vec<Task>;

    /// Counts taken from a single consistent snapshot.
    async fn stats(&self) -> TaskStats;
}
