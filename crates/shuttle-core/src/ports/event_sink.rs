//! EventSink port - イベント記録の抽象化
//!
//! Scheduler は状態遷移のたびに TaskEvent を送ります。
//! 送信失敗はログに残すだけで、スケジューリング自体は失敗させません。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::TaskEvent;

#[derive(Debug, Error)]
pub enum EventSinkError {
    #[error("event sink unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: TaskEvent) -> Result<(), EventSinkError>;
}

/// 何もしない EventSink（デフォルト）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn emit(&self, _event: TaskEvent) -> Result<(), EventSinkError> {
        Ok(())
    }
}
