//! Scheduler - the public operation set.
//!
//! Validates input, resolves configured defaults, delegates guarded changes to
//! the TaskStore, and reports every successful change to the snapshot store
//! and the event sink.
//!
//! A change and its publication happen under one per-task lock, so the
//! collaborators see a task's changes in the order the store applied them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::domain::{
    ActivityId, NewTask, Result, SchedulerError, Task, TaskEvent, TaskEventKind, TaskId,
    TaskStatus, TaskUpdate,
};
use crate::observability::TaskStats;
use crate::ports::{Clock, EventSink, SnapshotStore, TaskStore, Transition};
use crate::store::{RetryPolicy, TaskFilter};

use super::builder::SchedulerBuilder;

/// Held from a store change until its snapshot and event are out.
type PublishTurn = OwnedMutexGuard<()>;

/// One publication lock per task.
#[derive(Default)]
struct PublishLocks {
    locks: Mutex<HashMap<TaskId, Arc<Mutex<()>>>>,
}

impl PublishLocks {
    async fn acquire(&self, id: TaskId) -> PublishTurn {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    /// Unknown ids must not pile up entries.
    async fn forget(&self, id: TaskId) {
        self.locks.lock().await.remove(&id);
    }
}

pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    snapshots: Arc<dyn SnapshotStore>,
    config: SchedulerConfig,
    retry_policy: RetryPolicy,
    publish_locks: PublishLocks,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// In-memory scheduler on the system clock.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub(crate) fn from_parts(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
        snapshots: Arc<dyn SnapshotStore>,
        config: SchedulerConfig,
    ) -> Self {
        let retry_policy = config.retry_policy();
        Self {
            store,
            clock,
            events,
            snapshots,
            config,
            retry_policy,
            publish_locks: PublishLocks::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Accept a task. It starts out `pending` with `retry_count == 0`.
    pub async fn schedule_task(&self, spec: NewTask) -> Result<Task> {
        spec.validate()?;
        let priority = spec.priority.unwrap_or(self.config.default_priority);
        let max_retries = spec.max_retries.unwrap_or(self.config.default_max_retries);

        // The id becomes visible to other callers as soon as `create` returns,
        // so its lock is registered and taken before the map is released.
        let (task, _turn) = {
            let mut locks = self.publish_locks.locks.lock().await;
            let task = self
                .store
                .create(spec, priority, max_retries, self.clock.now())
                .await?;
            let lock = Arc::new(Mutex::new(()));
            let turn = Arc::clone(&lock).lock_owned().await;
            locks.insert(task.id, lock);
            (task, turn)
        };
        info!(
            task_id = %task.id,
            experiment_run_id = %task.experiment_run_id,
            controller_id = %task.controller_id,
            activity = %task.activity_name,
            priority = %task.priority,
            "task scheduled"
        );
        self.publish(&task, TaskEventKind::Scheduled).await;
        Ok(task)
    }

    pub async fn get_task(&self, id: TaskId) -> Option<Task> {
        self.store.get(id).await
    }

    /// Change priority, metadata or max_retries. Status is not reachable from here.
    pub async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Task> {
        let _turn = self.publish_locks.acquire(id).await;
        let result = self.store.update(id, update, self.clock.now()).await;
        let task = self.forget_if_missing(id, result).await?;
        debug!(task_id = %id, "task updated");
        self.publish(&task, TaskEventKind::Updated).await;
        Ok(task)
    }

    /// Withdraw a task that has not been dispatched yet.
    pub async fn cancel_task(&self, id: TaskId, reason: impl Into<String>) -> Result<Task> {
        let reason = reason.into();
        let _turn = self.publish_locks.acquire(id).await;
        let task = self
            .apply(id, Transition::Cancel {
                reason: reason.clone(),
            })
            .await?;
        info!(task_id = %id, %reason, "task cancelled");
        self.publish(&task, TaskEventKind::Cancelled { reason }).await;
        Ok(task)
    }

    /// Advisory: the returned task is not claimed. Call `mark_started` and be
    /// ready for it to fail if another dispatcher got there first.
    pub async fn get_next_task(&self) -> Option<Task> {
        let task = self.store.next_eligible(self.clock.now()).await;
        if let Some(task) = &task {
            debug!(task_id = %task.id, priority = %task.priority, "next eligible task");
        }
        task
    }

    pub async fn mark_started(&self, id: TaskId, activity_id: ActivityId) -> Result<Task> {
        let _turn = self.publish_locks.acquire(id).await;
        let task = self
            .apply(id, Transition::Start {
                activity_id: activity_id.clone(),
            })
            .await?;
        info!(task_id = %id, %activity_id, "task started");
        self.publish(&task, TaskEventKind::Started { activity_id })
            .await;
        Ok(task)
    }

    pub async fn mark_completed(&self, id: TaskId) -> Result<Task> {
        let _turn = self.publish_locks.acquire(id).await;
        let task = self.apply(id, Transition::Complete).await?;
        info!(task_id = %id, "task completed");
        self.publish(&task, TaskEventKind::Completed).await;
        Ok(task)
    }

    pub async fn mark_failed(&self, id: TaskId, reason: impl Into<String>) -> Result<Task> {
        let reason = reason.into();
        let _turn = self.publish_locks.acquire(id).await;
        let task = self
            .apply(id, Transition::Fail {
                reason: reason.clone(),
            })
            .await?;
        warn!(task_id = %id, %reason, retry_count = task.retry_count, "task failed");
        self.publish(&task, TaskEventKind::Failed { reason }).await;
        Ok(task)
    }

    /// Move a failed task back into the queue after a backoff delay.
    ///
    /// Returns `Ok(None)` when retries are exhausted; the task stays `failed`.
    pub async fn schedule_retry(&self, id: TaskId) -> Result<Option<Task>> {
        let _turn = self.publish_locks.acquire(id).await;
        let result = self
            .store
            .schedule_retry(id, &self.retry_policy, self.clock.now())
            .await;
        let Some(task) = self.forget_if_missing(id, result).await? else {
            info!(task_id = %id, "retries exhausted");
            return Ok(None);
        };

        // next_retry is always set once the task is scheduled
        if let Some(next_retry) = task.next_retry {
            info!(
                task_id = %id,
                retry_count = task.retry_count,
                max_retries = task.max_retries,
                %next_retry,
                "retry scheduled"
            );
            self.publish(
                &task,
                TaskEventKind::RetryScheduled {
                    retry_count: task.retry_count,
                    next_retry,
                },
            )
            .await;
        }
        Ok(Some(task))
    }

    pub async fn query_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        self.store.query(filter).await
    }

    pub async fn get_running_tasks(&self) -> Vec<Task> {
        self.query_tasks(&TaskFilter::all().status(TaskStatus::Running))
            .await
    }

    pub async fn get_task_stats(&self) -> TaskStats {
        self.store.stats().await
    }

    async fn apply(&self, id: TaskId, transition: Transition) -> Result<Task> {
        let name = transition.name();
        let result = self
            .store
            .transition(id, transition, self.clock.now())
            .await
            .inspect_err(|e| debug!(task_id = %id, transition = name, error = %e, "transition rejected"));
        self.forget_if_missing(id, result).await
    }

    /// Drops the publish lock entry created for an id the store does not know.
    async fn forget_if_missing<T>(&self, id: TaskId, result: Result<T>) -> Result<T> {
        if let Err(SchedulerError::NotFound(_)) = &result {
            self.publish_locks.forget(id).await;
        }
        result
    }

    /// Snapshot + event. Collaborator failures are logged, never returned.
    async fn publish(&self, task: &Task, kind: TaskEventKind) {
        if let Err(e) = self.snapshots.save(task).await {
            warn!(task_id = %task.id, error = %e, "failed to save task snapshot");
        }
        let event = TaskEvent::from_task(task, kind);
        let name = event.name();
        if let Err(e) = self.events.emit(event).await {
            warn!(task_id = %task.id, event = name, error = %e, "failed to emit task event");
        }
    }
}
