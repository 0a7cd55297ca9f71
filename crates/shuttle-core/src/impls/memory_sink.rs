//! InMemoryEventSink - 受け取ったイベントをメモリに溜める

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::TaskEvent;
use crate::ports::{EventSink, EventSinkError};

/// Keeps every emitted event in emission order.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<TaskEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far.
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn emit(&self, event: TaskEvent) -> Result<(), EventSinkError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewTask, Priority, Task, TaskEventKind};
    use crate::ports::{IdGenerator, SystemClock, UlidGenerator};
    use chrono::Utc;

    #[tokio::test]
    async fn keeps_emission_order() {
        let sink = InMemoryEventSink::new();
        assert!(sink.is_empty());

        let id = UlidGenerator::new(SystemClock).generate_task_id();
        let task = Task::new(id, NewTask::new("e", "c", "BUILD"), Priority::Normal, 3, Utc::now());
        sink.emit(TaskEvent::from_task(&task, TaskEventKind::Scheduled))
            .await
            .unwrap();
        sink.emit(TaskEvent::from_task(&task, TaskEventKind::Updated))
            .await
            .unwrap();

        let names: Vec<_> = sink.events().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["task_scheduled", "task_updated"]);
        assert_eq!(sink.len(), 2);
    }
}
