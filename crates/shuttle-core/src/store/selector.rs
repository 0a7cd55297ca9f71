//! Selector: picks the next dispatchable task.
//!
//! Stateless: it ranks whatever the store hands it and never mutates anything.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::domain::{Priority, Task};

/// Dispatch rank of an eligible task. Greater means "dispatch sooner".
///
/// Strictly higher priority always wins; within a priority the older task
/// wins, and the store's insertion sequence breaks `created_at` ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRank {
    priority: Priority,
    created_at: DateTime<Utc>,
    seq: u64,
}

impl DispatchRank {
    pub fn of(task: &Task, seq: u64) -> Self {
        Self {
            priority: task.priority,
            created_at: task.created_at,
            seq,
        }
    }
}

impl PartialOrd for DispatchRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DispatchRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            // Reverse: earlier creation ranks higher
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Return the most eligible task at `now`, if any.
///
/// `candidates` yields each task with its insertion sequence number.
pub fn select_next<'a, I>(candidates: I, now: DateTime<Utc>) -> Option<&'a Task>
where
    I: IntoIterator<Item = (u64, &'a Task)>,
{
    candidates
        .into_iter()
        .filter(|(_, task)| task.is_eligible(now))
        .max_by_key(|(seq, task)| DispatchRank::of(task, *seq))
        .map(|(_, task)| task)
}
