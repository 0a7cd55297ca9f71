//! Controller port - 装置コントローラとの接続
//!
//! Dispatch loop は claim 済みの Task をここへ渡し、
//! 終了状態（完了・失敗・キャンセル）を受け取ります。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ActivityId, Task};

/// Terminal status reported by a controller for one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    Completed,
    Failed,
    Canceled,
}

/// What a controller reports back when an activity ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub status: ActivityStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_msg: Option<String>,

    /// Identifiers of data products the activity produced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<String>,
}

impl ActivityReport {
    pub fn completed(products: Vec<String>) -> Self {
        Self {
            status: ActivityStatus::Completed,
            status_msg: None,
            products,
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            status: ActivityStatus::Failed,
            status_msg: Some(msg.into()),
            products: Vec::new(),
        }
    }

    pub fn canceled(msg: impl Into<String>) -> Self {
        Self {
            status: ActivityStatus::Canceled,
            status_msg: Some(msg.into()),
            products: Vec::new(),
        }
    }

    /// Failure reason to record on the task, `None` on success.
    pub fn failure_reason(&self) -> Option<String> {
        match self.status {
            ActivityStatus::Completed => None,
            ActivityStatus::Failed => Some(
                self.status_msg
                    .clone()
                    .unwrap_or_else(|| "activity failed".to_string()),
            ),
            ActivityStatus::Canceled => Some(format!(
                "activity canceled by controller: {}",
                self.status_msg.as_deref().unwrap_or("no reason given")
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller rejected activity: {0}")]
    Rejected(String),

    #[error("controller unreachable: {0}")]
    Unreachable(String),
}

/// Executes a dispatched task's activity and waits for it to end.
#[async_trait]
pub trait Controller: Send + Sync {
    async fn run_activity(
        &self,
        task: &Task,
        activity_id: &ActivityId,
    ) -> Result<ActivityReport, ControllerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reason_per_status() {
        assert_eq!(ActivityReport::completed(vec![]).failure_reason(), None);
        assert_eq!(
            ActivityReport::failed("Calibration target not found").failure_reason(),
            Some("Calibration target not found".to_string())
        );
        let reason = ActivityReport::canceled("Deadline exceeded")
            .failure_reason()
            .unwrap();
        assert!(reason.contains("Deadline exceeded"));
    }

    #[test]
    fn status_uses_controller_wire_names() {
        let s = serde_json::to_string(&ActivityStatus::Canceled).unwrap();
        assert_eq!(s, "\"CANCELED\"");
    }
}
