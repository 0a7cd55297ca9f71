//! Task record: the unit of schedulable work and its guarded transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{Result, SchedulerError};
use super::ids::{ActivityId, ControllerId, ExperimentRunId, TaskId};
use super::priority::Priority;
use super::spec::{ActivityOption, NewTask, TaskUpdate};
use super::state::TaskStatus;

/// A task tracked by the scheduler.
///
/// Design:
/// - The task store owns every `Task`; callers only ever see clones.
/// - All status changes go through the transition methods below, which check
///   the guard before touching any field. A failed guard leaves the task as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub experiment_run_id: ExperimentRunId,
    pub controller_id: ControllerId,
    pub activity_name: String,
    pub activity_options: Vec<ActivityOption>,
    pub priority: Priority,
    pub status: TaskStatus,

    /// Number of retries scheduled so far. Never exceeds `max_retries`.
    pub retry_count: u32,
    pub max_retries: u32,

    /// Correlation id of the current (or last) execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<ActivityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Present iff `status == Scheduled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry: Option<DateTime<Utc>>,

    /// Present iff `status` is `Failed` or `Cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Most recent failure reason, kept across retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Task {
    /// Build a pending task. `priority` and `max_retries` are already resolved
    /// against the configured defaults.
    pub fn new(
        id: TaskId,
        spec: NewTask,
        priority: Priority,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            experiment_run_id: spec.experiment_run_id,
            controller_id: spec.controller_id,
            activity_name: spec.activity_name,
            activity_options: spec.activity_options,
            priority,
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries,
            activity_id: None,
            metadata: spec.metadata,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            next_retry: None,
            error: None,
            last_error: None,
        }
    }

    /// Is this task a candidate for dispatch at `now`?
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            TaskStatus::Pending => true,
            TaskStatus::Scheduled => self.next_retry.is_some_and(|at| at <= now),
            _ => false,
        }
    }

    pub fn retries_remaining(&self) -> u32 {
        self.max_retries.saturating_sub(self.retry_count)
    }

    /// Pending/Scheduled -> Running.
    pub fn start(&mut self, activity_id: ActivityId, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_start() {
            return Err(SchedulerError::guard(self.id, "start", self.status));
        }
        if activity_id.is_empty() {
            return Err(SchedulerError::Validation(
                "activity_id must not be empty".to_string(),
            ));
        }
        self.status = TaskStatus::Running;
        self.activity_id = Some(activity_id);
        self.started_at = Some(now);
        self.next_retry = None;
        self.updated_at = now;
        Ok(())
    }

    /// Running -> Completed.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != TaskStatus::Running {
            return Err(SchedulerError::guard(self.id, "complete", self.status));
        }
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Running -> Failed.
    pub fn fail(&mut self, reason: String, now: DateTime<Utc>) -> Result<()> {
        if self.status != TaskStatus::Running {
            return Err(SchedulerError::guard(self.id, "fail", self.status));
        }
        let reason = non_empty_reason(reason)?;
        self.status = TaskStatus::Failed;
        self.error = Some(reason.clone());
        self.last_error = Some(reason);
        self.updated_at = now;
        Ok(())
    }

    /// Pending/Scheduled -> Cancelled.
    pub fn cancel(&mut self, reason: String, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_cancel() {
            return Err(SchedulerError::guard(self.id, "cancel", self.status));
        }
        let reason = non_empty_reason(reason)?;
        self.status = TaskStatus::Cancelled;
        self.error = Some(reason);
        self.next_retry = None;
        self.updated_at = now;
        Ok(())
    }

    /// Failed -> Scheduled.
    ///
    /// The caller checks `retries_remaining()` first; this method still refuses
    /// to push `retry_count` past `max_retries`.
    pub fn schedule_retry(&mut self, next_retry: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        if self.status != TaskStatus::Failed || self.retries_remaining() == 0 {
            return Err(SchedulerError::guard(self.id, "retry", self.status));
        }
        self.retry_count += 1;
        self.status = TaskStatus::Scheduled;
        self.next_retry = Some(next_retry);
        self.error = None;
        self.updated_at = now;
        Ok(())
    }

    /// Shallow merge of the mutable fields. Never touches status.
    pub fn apply_update(&mut self, update: TaskUpdate, now: DateTime<Utc>) -> Result<()> {
        if let Some(max_retries) = update.max_retries
            && max_retries < self.retry_count
        {
            return Err(SchedulerError::Validation(format!(
                "max_retries {max_retries} is below retry_count {}",
                self.retry_count
            )));
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(metadata) = update.metadata {
            self.metadata = Some(metadata);
        }
        if let Some(max_retries) = update.max_retries {
            self.max_retries = max_retries;
        }
        self.updated_at = now;
        Ok(())
    }
}

fn non_empty_reason(reason: String) -> Result<String> {
    if reason.trim().is_empty() {
        return Err(SchedulerError::Validation(
            "reason must not be empty".to_string(),
        ));
    }
    Ok(reason)
}
