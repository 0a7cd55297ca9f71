//! SchedulerBuilder - Scheduler の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に設定を検証し、不正なら ValidationError を返す
//! - 指定されなかったポートはデフォルト実装で埋める

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::domain::Result;
use crate::ports::{
    Clock, EventSink, IdGenerator, NoopEventSink, NoopSnapshotStore, SnapshotStore, SystemClock,
    TaskStore, UlidGenerator,
};
use crate::store::InMemoryTaskStore;

use super::scheduler::Scheduler;

/// SchedulerBuilder は Scheduler を構築
///
/// # 使用例
/// ```ignore
/// let scheduler = Scheduler::builder()
///     .config(SchedulerConfig::default().with_default_max_retries(5))
///     .event_sink(Arc::new(InMemoryEventSink::new()))
///     .build()?;
/// ```
///
/// # デフォルト
/// - clock: SystemClock
/// - store: InMemoryTaskStore（id_generator か、clock ベースの UlidGenerator を使用）
/// - event sink / snapshot store: Noop
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn TaskStore>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    events: Option<Arc<dyn EventSink>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use an existing store. Takes precedence over `id_generator`.
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn snapshot_store(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn build(self) -> Result<Scheduler> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = match self.store {
            Some(store) => store,
            None => {
                let id_generator = self
                    .id_generator
                    .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
                Arc::new(InMemoryTaskStore::new(id_generator))
            }
        };

        Ok(Scheduler::from_parts(
            store,
            clock,
            self.events.unwrap_or_else(|| Arc::new(NoopEventSink)),
            self.snapshots.unwrap_or_else(|| Arc::new(NoopSnapshotStore)),
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewTask, SchedulerError};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    #[test]
    fn build_with_defaults() {
        assert!(SchedulerBuilder::new().build().is_ok());
    }

    #[test]
    fn build_rejects_invalid_config() {
        let result = SchedulerBuilder::new()
            .config(
                SchedulerConfig::default()
                    .with_base_retry_delay_ms(10_000)
                    .with_max_retry_delay_ms(1_000),
            )
            .build();
        assert!(matches!(result, Err(SchedulerError::Validation(_))));
    }

    #[tokio::test]
    async fn shared_store_is_visible_from_both_schedulers() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::default());
        let a = SchedulerBuilder::new().store(Arc::clone(&store)).build().unwrap();
        let b = SchedulerBuilder::new().store(store).build().unwrap();

        let task = a.schedule_task(NewTask::new("e", "c", "BUILD")).await.unwrap();
        assert_eq!(b.get_task(task.id).await, Some(task));
    }

    #[tokio::test]
    async fn ids_use_the_configured_clock() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let scheduler = SchedulerBuilder::new()
            .clock(Arc::new(FixedClock::new(at)))
            .build()
            .unwrap();
        let task = scheduler
            .schedule_task(NewTask::new("e", "c", "BUILD"))
            .await
            .unwrap();
        assert_eq!(task.id.as_ulid().timestamp_ms(), at.timestamp_millis() as u64);
        assert_eq!(task.created_at, at);
    }
}
