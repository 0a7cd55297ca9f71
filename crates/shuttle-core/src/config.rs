//! Scheduler and dispatch configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{Priority, Result, SchedulerError};
use crate::store::RetryPolicy;

/// Configuration accepted by the scheduler at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Used when a submission omits `max_retries`.
    pub default_max_retries: u32,
    /// Backoff base: the first retry waits `base * 2`.
    pub base_retry_delay_ms: u64,
    /// Backoff ceiling.
    pub max_retry_delay_ms: u64,
    /// Used when a submission omits `priority`.
    pub default_priority: Priority,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 3,
            base_retry_delay_ms: 1_000,
            max_retry_delay_ms: 60_000,
            default_priority: Priority::Normal,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    pub fn with_base_retry_delay_ms(mut self, ms: u64) -> Self {
        self.base_retry_delay_ms = ms;
        self
    }

    pub fn with_max_retry_delay_ms(mut self, ms: u64) -> Self {
        self.max_retry_delay_ms = ms;
        self
    }

    pub fn with_default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_retry_delay_ms == 0 {
            return Err(SchedulerError::Validation(
                "base_retry_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.base_retry_delay_ms > self.max_retry_delay_ms {
            return Err(SchedulerError::Validation(format!(
                "base_retry_delay_ms ({}) exceeds max_retry_delay_ms ({})",
                self.base_retry_delay_ms, self.max_retry_delay_ms
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.base_retry_delay_ms),
            Duration::from_millis(self.max_retry_delay_ms),
        )
    }
}

/// Configuration for the dispatch loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of concurrent dispatch workers.
    pub workers: usize,
    /// Sleep between selections when nothing is eligible.
    pub poll_interval_ms: u64,
    /// Fail an activity that has not reported back within this time.
    pub activity_timeout_ms: Option<u64>,
    /// Request a retry after every failure.
    pub retry_failed: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            poll_interval_ms: 100,
            activity_timeout_ms: None,
            retry_failed: true,
        }
    }
}

impl DispatchConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_activity_timeout_ms(mut self, ms: u64) -> Self {
        self.activity_timeout_ms = Some(ms);
        self
    }

    pub fn with_retry_failed(mut self, retry_failed: bool) -> Self {
        self.retry_failed = retry_failed;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn activity_timeout(&self) -> Option<Duration> {
        self.activity_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SchedulerError::Validation(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.activity_timeout_ms == Some(0) {
            return Err(SchedulerError::Validation(
                "activity_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Both sections, as read from a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub dispatch: DispatchConfig,
}

impl Config {
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(s)
            .map_err(|e| SchedulerError::Validation(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.dispatch.validate()
    }
}
