//! SnapshotStore port - 永続化アダプタ
//!
//! Task のスナップショットを外部ストレージへ記録します。
//! 永続化の仕組みそのものは実装側の責務です。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Task;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot backend unavailable: {0}")]
    Unavailable(String),

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durably records the latest state of a task.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, task: &Task) -> Result<(), SnapshotError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSnapshotStore;

#[async_trait]
impl SnapshotStore for NoopSnapshotStore {
    async fn save(&self, _task: &Task) -> Result<(), SnapshotError> {
        Ok(())
    }
}
