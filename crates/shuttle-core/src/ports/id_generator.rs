//! IdGenerator port - TaskId / ActivityId の発行
//!
//! TaskId は InMemoryTaskStore が、ActivityId は dispatch worker が
//! claim のたびに発行します。

use crate::domain::{ActivityId, TaskId};
use crate::ports::Clock;
use ulid::Ulid;

/// Shared by the store and every dispatch worker.
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_activity_id(&self) -> ActivityId;
}

/// ULID whose timestamp part comes from the clock (deterministic under
/// `FixedClock`) and whose random part comes from `rand`.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn generate_activity_id(&self) -> ActivityId {
        ActivityId::new(format!("act-{}", self.next_ulid()))
    }
}
