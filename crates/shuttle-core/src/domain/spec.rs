//! Input specs: what a caller submits (`NewTask`) and what it may change
//! afterwards (`TaskUpdate`).
//!
//! Activity options and metadata are owned by upstream planning, so we keep
//! them loosely typed: an ordered list of string pairs and an opaque JSON blob.

use serde::{Deserialize, Serialize};

use super::errors::{Result, SchedulerError};
use super::ids::{ControllerId, ExperimentRunId};
use super::priority::Priority;

/// One `key=value` option passed through to the controller. Order is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityOption {
    pub key: String,
    pub value: String,
}

impl ActivityOption {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A task submission.
///
/// `priority` and `max_retries` fall back to the scheduler's configured
/// defaults when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub experiment_run_id: ExperimentRunId,
    pub controller_id: ControllerId,
    pub activity_name: String,

    #[serde(default)]
    pub activity_options: Vec<ActivityOption>,

    #[serde(default)]
    pub priority: Option<Priority>,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl NewTask {
    pub fn new(
        experiment_run_id: impl Into<ExperimentRunId>,
        controller_id: impl Into<ControllerId>,
        activity_name: impl Into<String>,
    ) -> Self {
        Self {
            experiment_run_id: experiment_run_id.into(),
            controller_id: controller_id.into(),
            activity_name: activity_name.into(),
            activity_options: Vec::new(),
            priority: None,
            max_retries: None,
            metadata: None,
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.activity_options.push(ActivityOption::new(key, value));
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.experiment_run_id.is_empty() {
            return Err(SchedulerError::Validation(
                "experiment_run_id must not be empty".to_string(),
            ));
        }
        if self.controller_id.is_empty() {
            return Err(SchedulerError::Validation(
                "controller_id must not be empty".to_string(),
            ));
        }
        if self.activity_name.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "activity_name must not be empty".to_string(),
            ));
        }
        if let Some(pos) = self
            .activity_options
            .iter()
            .position(|opt| opt.key.trim().is_empty())
        {
            return Err(SchedulerError::Validation(format!(
                "activity_options[{pos}] has an empty key"
            )));
        }
        Ok(())
    }
}

/// Fields a caller may change on an existing task.
///
/// Status is deliberately absent: lifecycle changes go through the explicit
/// transition operations. Unknown fields are rejected when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl TaskUpdate {
    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn metadata(metadata: serde_json::Value) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::default()
        }
    }

    pub fn max_retries(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.metadata.is_none() && self.max_retries.is_none()
    }
}
