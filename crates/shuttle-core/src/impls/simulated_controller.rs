//! SimulatedController - 実機なしで activity を実行する
//!
//! 既知の activity 名だけを受け付け、指定された名前では決まって失敗します。
//! 成功時はデータプロダクト ID を 2 つ発行します。

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use ulid::Ulid;

use crate::domain::{ActivityId, Task};
use crate::ports::{ActivityReport, Controller, ControllerError};

pub const DEFAULT_ACTIVITIES: [&str; 2] = ["BUILD", "SCAN"];
pub const CALIBRATION_FAILURE: &str = "Calibration target not found";

const PRODUCTS_PER_ACTIVITY: usize = 2;

#[derive(Debug, Clone)]
pub struct SimulatedController {
    activities: BTreeSet<String>,
    failing: BTreeSet<String>,
    latency: Duration,
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self {
            activities: DEFAULT_ACTIVITIES.iter().map(|s| s.to_string()).collect(),
            failing: BTreeSet::new(),
            latency: Duration::ZERO,
        }
    }
}

impl SimulatedController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Accept these activity names in addition to the ones already known.
    pub fn with_activities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.activities.extend(names.into_iter().map(Into::into));
        self
    }

    /// Activities with these names always fail.
    pub fn failing_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn knows(&self, activity_name: &str) -> bool {
        self.activities.contains(activity_name)
    }
}

#[async_trait]
impl Controller for SimulatedController {
    async fn run_activity(
        &self,
        task: &Task,
        activity_id: &ActivityId,
    ) -> Result<ActivityReport, ControllerError> {
        let name = task.activity_name.as_str();
        if !self.knows(name) {
            return Err(ControllerError::Rejected(format!(
                "unknown activity name: {name}"
            )));
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing.contains(name) {
            debug!(task_id = %task.id, %activity_id, activity = name, "simulated failure");
            return Ok(ActivityReport::failed(CALIBRATION_FAILURE));
        }

        let products = (0..PRODUCTS_PER_ACTIVITY)
            .map(|_| format!("dp-{}", Ulid::new()))
            .collect();
        debug!(task_id = %task.id, %activity_id, activity = name, "simulated activity done");
        Ok(ActivityReport::completed(products))
    }
}
