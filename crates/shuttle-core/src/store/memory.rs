//! In-memory task store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::query::{collect_stats, filter_tasks};
use super::selector::select_next;
use super::{RetryPolicy, TaskFilter};
use crate::domain::{
    NewTask, Priority, Result, SchedulerError, Task, TaskId, TaskStatus, TaskUpdate,
};
use crate::observability::TaskStats;
use crate::ports::{IdGenerator, SystemClock, TaskStore, Transition, UlidGenerator};

/// A task plus its insertion sequence (FIFO tie-breaker).
#[derive(Debug, Clone)]
struct TaskEntry {
    seq: u64,
    task: Task,
}

/// In-memory store state.
///
/// - `records` is the single source of truth for tasks.
/// - `order` holds TaskIds in insertion order. Tasks are never removed, so
///   iterating it gives a stable order across calls.
#[derive(Default)]
struct InMemoryStoreState {
    records: HashMap<TaskId, TaskEntry>,
    order: Vec<TaskId>,
    next_seq: u64,
}

impl InMemoryStoreState {
    fn entries(&self) -> impl Iterator<Item = &TaskEntry> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.entries().map(|entry| &entry.task)
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.records
            .get_mut(&id)
            .map(|entry| &mut entry.task)
            .ok_or(SchedulerError::NotFound(id))
    }

    fn insert(&mut self, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push(task.id);
        self.records.insert(task.id, TaskEntry { seq, task });
    }
}

/// In-memory `TaskStore`.
///
/// Every operation takes the state lock once, checks the guard and applies
/// the change under that same lock, so concurrent transitions on one task
/// serialize and exactly one of them wins.
pub struct InMemoryTaskStore {
    state: Mutex<InMemoryStoreState>,
    id_gen: Arc<dyn IdGenerator>,
}

impl InMemoryTaskStore {
    pub fn new(id_gen: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(InMemoryStoreState::default()),
            id_gen,
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new(Arc::new(UlidGenerator::new(SystemClock)))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(
        &self,
        spec: NewTask,
        priority: Priority,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let mut state = self.state.lock().await;
        let mut id = self.id_gen.generate_task_id();
        while state.records.contains_key(&id) {
            id = self.id_gen.generate_task_id();
        }
        let task = Task::new(id, spec, priority, max_retries, now);
        state.insert(task.clone());
        Ok(task)
    }

    async fn get(&self, id: TaskId) -> Option<Task> {
        let state = self.state.lock().await;
        state.records.get(&id).map(|entry| entry.task.clone())
    }

    async fn update(&self, id: TaskId, update: TaskUpdate, now: DateTime<Utc>) -> Result<Task> {
        let mut state = self.state.lock().await;
        let task = state.task_mut(id)?;
        task.apply_update(update, now)?;
        Ok(task.clone())
    }

    async fn transition(
        &self,
        id: TaskId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let mut state = self.state.lock().await;
        let task = state.task_mut(id)?;
        match transition {
            Transition::Start { activity_id } => task.start(activity_id, now)?,
            Transition::Complete => task.complete(now)?,
            Transition::Fail { reason } => task.fail(reason, now)?,
            Transition::Cancel { reason } => task.cancel(reason, now)?,
        }
        Ok(task.clone())
    }

    async fn schedule_retry(
        &self,
        id: TaskId,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>> {
        let mut state = self.state.lock().await;
        let task = state.task_mut(id)?;
        if task.status != TaskStatus::Failed {
            return Err(SchedulerError::guard(id, "retry", task.status));
        }
        if !policy.allows_retry(task.retry_count, task.max_retries) {
            return Ok(None);
        }

        let delay = policy.next_delay(task.retry_count + 1);
        let next_retry = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        task.schedule_retry(next_retry, now)?;
        Ok(Some(task.clone()))
    }

    async fn next_eligible(&self, now: DateTime<Utc>) -> Option<Task> {
        let state = self.state.lock().await;
        select_next(state.entries().map(|e| (e.seq, &e.task)), now).cloned()
    }

    async fn query(&self, filter: &TaskFilter) -> Vec<Task> {
        let state = self.state.lock().await;
        filter_tasks(state.tasks(), filter)
    }

    async fn stats(&self) -> TaskStats {
        let state = self.state.lock().await;
        collect_stats(state.tasks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActivityId;
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn store() -> InMemoryTaskStore {
        InMemoryTaskStore::new(Arc::new(UlidGenerator::new(FixedClock::new(t0()))))
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(StdDuration::from_secs(1), StdDuration::from_secs(60))
    }

    async fn failed_task(store: &InMemoryTaskStore, max_retries: u32) -> Task {
        let task = store
            .create(NewTask::new("exp-1", "c", "BUILD"), Priority::Normal, max_retries, t0())
            .await
            .unwrap();
        store
            .transition(
                task.id,
                Transition::Start {
                    activity_id: ActivityId::new("act-1"),
                },
                t0(),
            )
            .await
            .unwrap();
        store
            .transition(
                task.id,
                Transition::Fail {
                    reason: "jam".to_string(),
                },
                t0(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_assigns_unique_ids() {
        let store = store();
        let a = store
            .create(NewTask::new("e", "c", "BUILD"), Priority::Normal, 1, t0())
            .await
            .unwrap();
        let b = store
            .create(NewTask::new("e", "c", "BUILD"), Priority::Normal, 1, t0())
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.stats().await.total, 2);
    }

    #[tokio::test]
    async fn unknown_ids() {
        let store = store();
        let id = UlidGenerator::new(SystemClock).generate_task_id();
        assert!(store.get(id).await.is_none());
        assert_eq!(
            store.transition(id, Transition::Complete, t0()).await,
            Err(SchedulerError::NotFound(id))
        );
        assert_eq!(
            store.update(id, TaskUpdate::default(), t0()).await,
            Err(SchedulerError::NotFound(id))
        );
        assert_eq!(
            store.schedule_retry(id, &policy(), t0()).await,
            Err(SchedulerError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn failed_transition_leaves_store_unchanged() {
        let store = store();
        let task = store
            .create(NewTask::new("e", "c", "BUILD"), Priority::Normal, 1, t0())
            .await
            .unwrap();
        let err = store
            .transition(task.id, Transition::Complete, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::GuardViolation { .. }));
        assert_eq!(store.get(task.id).await.unwrap(), task);
    }

    #[tokio::test]
    async fn first_retry_uses_exponent_one() {
        let store = store();
        let task = failed_task(&store, 3).await;
        let retried = store
            .schedule_retry(task.id, &policy(), t0())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(retried.status, TaskStatus::Scheduled);
        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.next_retry, Some(t0() + Duration::seconds(2)));
    }

    #[tokio::test]
    async fn exhausted_retry_returns_none_and_keeps_failed() {
        let store = store();
        let task = failed_task(&store, 0).await;
        let result = store.schedule_retry(task.id, &policy(), t0()).await.unwrap();
        assert!(result.is_none());
        assert_eq!(store.get(task.id).await.unwrap(), task);
    }

    #[tokio::test]
    async fn retry_on_pending_task_is_a_guard_violation() {
        let store = store();
        let task = store
            .create(NewTask::new("e", "c", "BUILD"), Priority::Normal, 3, t0())
            .await
            .unwrap();
        let err = store
            .schedule_retry(task.id, &policy(), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::GuardViolation { operation: "retry", .. }));
    }

    #[tokio::test]
    async fn query_order_is_insertion_order() {
        let store = store();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let t = store
                .create(NewTask::new("e", "c", "BUILD"), Priority::Normal, 1, t0())
                .await
                .unwrap();
            ids.push(t.id);
        }
        let first: Vec<_> = store.query(&TaskFilter::all()).await.iter().map(|t| t.id).collect();
        let second: Vec<_> = store.query(&TaskFilter::all()).await.iter().map(|t| t.id).collect();
        assert_eq!(first, ids);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn concurrent_starts_have_exactly_one_winner() {
        let store = Arc::new(store());
        let task = store
            .create(NewTask::new("e", "c", "BUILD"), Priority::Normal, 1, t0())
            .await
            .unwrap();

        let mut joins = Vec::new();
        for n in 0..16 {
            let store = Arc::clone(&store);
            joins.push(tokio::spawn(async move {
                store
                    .transition(
                        task.id,
                        Transition::Start {
                            activity_id: ActivityId::new(format!("act-{n}")),
                        },
                        t0(),
                    )
                    .await
            }));
        }

        let mut wins = 0;
        for j in joins {
            match j.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) => assert!(matches!(e, SchedulerError::GuardViolation { .. })),
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_racing_start_has_exactly_one_winner() {
        for round in 0..32 {
            let store = Arc::new(store());
            let task = store
                .create(NewTask::new("e", "c", "BUILD"), Priority::Normal, 1, t0())
                .await
                .unwrap();

            let starter = {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .transition(
                            task.id,
                            Transition::Start {
                                activity_id: ActivityId::new(format!("act-{round}")),
                            },
                            t0(),
                        )
                        .await
                })
            };
            let canceller = {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .transition(
                            task.id,
                            Transition::Cancel {
                                reason: "run aborted".to_string(),
                            },
                            t0(),
                        )
                        .await
                })
            };
            let started = starter.await.unwrap();
            let cancelled = canceller.await.unwrap();

            let final_status = store.get(task.id).await.unwrap().status;
            match (started, cancelled) {
                (Ok(_), Err(e)) => {
                    assert!(matches!(e, SchedulerError::GuardViolation { operation: "cancel", .. }));
                    assert_eq!(final_status, TaskStatus::Running);
                }
                (Err(e), Ok(_)) => {
                    assert!(matches!(e, SchedulerError::GuardViolation { operation: "start", .. }));
                    assert_eq!(final_status, TaskStatus::Cancelled);
                }
                other => panic!("expected exactly one winner, got {other:?}"),
            }
        }
    }
}
