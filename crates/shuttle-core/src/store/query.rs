//! Read-only filtering and aggregation over tasks.

use serde::{Deserialize, Serialize};

use crate::domain::{ControllerId, ExperimentRunId, Task, TaskStatus};
use crate::observability::TaskStats;

/// Conjunctive filter: every field that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_run_id: Option<ExperimentRunId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_id: Option<ControllerId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    /// Matches every task.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn experiment_run(mut self, id: impl Into<ExperimentRunId>) -> Self {
        self.experiment_run_id = Some(id.into());
        self
    }

    pub fn controller(mut self, id: impl Into<ControllerId>) -> Self {
        self.controller_id = Some(id.into());
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.experiment_run_id
            .as_ref()
            .is_none_or(|id| *id == task.experiment_run_id)
            && self
                .controller_id
                .as_ref()
                .is_none_or(|id| *id == task.controller_id)
            && self.status.is_none_or(|status| status == task.status)
    }
}

/// Tasks matching `filter`, in iteration order.
pub fn filter_tasks<'a, I>(tasks: I, filter: &TaskFilter) -> Vec<Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect()
}

pub fn collect_stats<'a, I>(tasks: I) -> TaskStats
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .fold(TaskStats::default(), |mut stats, task| {
            stats.record(task.status);
            stats
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActivityId, NewTask, Priority, TaskId};
    use chrono::{TimeZone, Utc};
    use ulid::Ulid;

    fn task(run: &str, controller: &str) -> Task {
        Task::new(
            TaskId::from_ulid(Ulid::new()),
            NewTask::new(run, controller, "SCAN"),
            Priority::Normal,
            1,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn empty_filter_matches_everything() {
        let tasks = vec![task("exp-1", "a"), task("exp-2", "b")];
        assert_eq!(filter_tasks(&tasks, &TaskFilter::all()).len(), 2);
    }

    #[test]
    fn filter_is_a_conjunction() {
        let mut running = task("exp-1", "a");
        running
            .start(ActivityId::new("act"), running.created_at)
            .unwrap();
        let tasks = vec![
            task("exp-1", "a"),
            task("exp-1", "b"),
            running,
            task("exp-2", "a"),
        ];

        let f = TaskFilter::all().experiment_run("exp-1").controller("a");
        assert_eq!(filter_tasks(&tasks, &f).len(), 2);

        let f = f.status(TaskStatus::Running);
        let hits = filter_tasks(&tasks, &f);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, tasks[2].id);
    }

    #[test]
    fn stats_count_each_status_and_total() {
        let mut cancelled = task("exp-1", "a");
        cancelled
            .cancel("dropped".to_string(), cancelled.created_at)
            .unwrap();
        let tasks = vec![task("exp-1", "a"), task("exp-1", "a"), cancelled];

        let stats = collect_stats(&tasks);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(
            TaskStatus::ALL.iter().map(|s| stats.count(*s)).sum::<usize>(),
            stats.total
        );
    }
}
