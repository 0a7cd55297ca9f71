//! InMemorySnapshotStore - Task の最新状態を JSON として保持

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::{Task, TaskId};
use crate::ports::{SnapshotError, SnapshotStore};

/// Latest serialized snapshot per task. Each save overwrites the previous one.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Mutex<HashMap<TaskId, String>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON of the latest snapshot.
    pub fn raw(&self, id: TaskId) -> Option<String> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        let raw = self.raw(id)?;
        serde_json::from_str(&raw).ok()
    }

    pub fn len(&self) -> usize {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, task: &Task) -> Result<(), SnapshotError> {
        let raw = serde_json::to_string(task)?;
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task.id, raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActivityId, NewTask, Priority, TaskStatus};
    use crate::ports::{IdGenerator, SystemClock, UlidGenerator};
    use chrono::Utc;

    #[tokio::test]
    async fn latest_save_wins() {
        let store = InMemorySnapshotStore::new();
        let id = UlidGenerator::new(SystemClock).generate_task_id();
        let mut task = Task::new(
            id,
            NewTask::new("exp-1", "c", "BUILD").with_option("target", "M31"),
            Priority::High,
            3,
            Utc::now(),
        );
        store.save(&task).await.unwrap();

        task.start(ActivityId::new("act-1"), Utc::now()).unwrap();
        store.save(&task).await.unwrap();

        let snap = store.get(id).unwrap();
        assert_eq!(snap, task);
        assert_eq!(snap.status, TaskStatus::Running);
        assert_eq!(store.len(), 1);
        assert!(store.raw(id).unwrap().contains("\"running\""));
    }

    #[test]
    fn unknown_task_has_no_snapshot() {
        let store = InMemorySnapshotStore::new();
        let id = UlidGenerator::new(SystemClock).generate_task_id();
        assert!(store.get(id).is_none());
        assert!(store.is_empty());
    }
}
