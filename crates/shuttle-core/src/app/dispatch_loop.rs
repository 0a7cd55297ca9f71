//! Dispatch loop: select -> claim -> run on controller -> report -> retry.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::DispatchConfig;
use crate::domain::{ActivityId, ErrorKind, Task};
use crate::ports::{Controller, IdGenerator};

use super::scheduler::Scheduler;

/// Dispatch worker group handle.
/// - `request_shutdown()` stops every worker from claiming new tasks
/// - `shutdown_and_join()` also waits for in-flight activities to report back
pub struct DispatchLoop {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

/// Shared by all workers.
struct Worker {
    scheduler: Arc<Scheduler>,
    controller: Arc<dyn Controller>,
    id_gen: Arc<dyn IdGenerator>,
    config: DispatchConfig,
}

impl DispatchLoop {
    /// Spawn `config.workers` dispatch workers.
    pub fn spawn(
        scheduler: Arc<Scheduler>,
        controller: Arc<dyn Controller>,
        id_gen: Arc<dyn IdGenerator>,
        config: DispatchConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let n = config.workers.max(1);
        let worker = Arc::new(Worker {
            scheduler,
            controller,
            id_gen,
            config,
        });

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let w = Arc::clone(&worker);
            let mut rx = shutdown_rx.clone();
            joins.push(tokio::spawn(async move {
                w.run(worker_id, &mut rx).await;
            }));
        }
        info!(workers = n, "dispatch loop started");

        Self { shutdown_tx, joins }
    }

    /// Stop claiming new tasks. In-flight activities are not interrupted.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            if let Err(e) = j.await {
                error!(error = %e, "dispatch worker panicked");
            }
        }
        info!("dispatch loop stopped");
    }
}

impl Worker {
    async fn run(&self, worker_id: usize, shutdown_rx: &mut watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let Some((task, activity_id)) = self.claim_next(worker_id).await else {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.config.poll_interval()) => {}
                }
                continue;
            };

            self.execute(worker_id, task, activity_id).await;
        }
        debug!(worker_id, "dispatch worker exiting");
    }

    /// Select and claim one task, returning it with the activity id it was
    /// started under. Losing a claim race to another worker is expected:
    /// select again instead of giving up.
    async fn claim_next(&self, worker_id: usize) -> Option<(Task, ActivityId)> {
        loop {
            let candidate = self.scheduler.get_next_task().await?;
            let activity_id = self.id_gen.generate_activity_id();
            match self
                .scheduler
                .mark_started(candidate.id, activity_id.clone())
                .await
            {
                Ok(task) => return Some((task, activity_id)),
                Err(e) if e.kind() == ErrorKind::GuardViolation => {
                    debug!(worker_id, task_id = %candidate.id, "claim lost to another worker");
                }
                Err(e) => {
                    warn!(worker_id, task_id = %candidate.id, error = %e, "claim failed");
                    return None;
                }
            }
        }
    }

    async fn execute(&self, worker_id: usize, task: Task, activity_id: ActivityId) {
        let run = self.controller.run_activity(&task, &activity_id);
        let outcome = match self.config.activity_timeout() {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("activity timed out after {}ms", limit.as_millis())),
            },
            None => run.await.map_err(|e| e.to_string()),
        };

        let failure = match outcome {
            Ok(report) => report.failure_reason(),
            Err(reason) => Some(reason),
        };

        match failure {
            None => {
                if let Err(e) = self.scheduler.mark_completed(task.id).await {
                    warn!(worker_id, task_id = %task.id, error = %e, "completion report failed");
                }
            }
            Some(reason) => {
                if let Err(e) = self.scheduler.mark_failed(task.id, reason).await {
                    warn!(worker_id, task_id = %task.id, error = %e, "failure report failed");
                    return;
                }
                if self.config.retry_failed
                    && let Err(e) = self.scheduler.schedule_retry(task.id).await
                {
                    warn!(worker_id, task_id = %task.id, error = %e, "retry request failed");
                }
            }
        }
    }
}
