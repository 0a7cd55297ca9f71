//! End-to-end: plan -> dispatch loop -> simulated controller -> final states.

use std::sync::Arc;
use std::time::Duration;

use shuttle_core::domain::{TaskEventKind, TaskId};
use shuttle_core::impls::{InMemoryEventSink, InMemorySnapshotStore, SimulatedController};
use shuttle_core::ports::{IdGenerator, SystemClock, UlidGenerator};
use shuttle_core::store::TaskFilter;
use shuttle_core::{
    DispatchConfig, DispatchLoop, NewTask, Priority, Scheduler, SchedulerConfig, Task, TaskStatus,
};

struct Harness {
    scheduler: Arc<Scheduler>,
    events: Arc<InMemoryEventSink>,
    snapshots: Arc<InMemorySnapshotStore>,
}

fn harness() -> Harness {
    let events = Arc::new(InMemoryEventSink::new());
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let scheduler = Scheduler::builder()
        .config(
            SchedulerConfig::default()
                .with_base_retry_delay_ms(1)
                .with_max_retry_delay_ms(10),
        )
        .event_sink(events.clone())
        .snapshot_store(snapshots.clone())
        .build()
        .unwrap();
    Harness {
        scheduler: Arc::new(scheduler),
        events,
        snapshots,
    }
}

fn spawn(h: &Harness, controller: SimulatedController, workers: usize) -> DispatchLoop {
    let id_gen: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));
    DispatchLoop::spawn(
        Arc::clone(&h.scheduler),
        Arc::new(controller),
        id_gen,
        DispatchConfig::default()
            .with_workers(workers)
            .with_poll_interval_ms(2),
    )
}

fn settled(task: &Task) -> bool {
    match task.status {
        TaskStatus::Completed | TaskStatus::Cancelled => true,
        TaskStatus::Failed => task.retries_remaining() == 0,
        _ => false,
    }
}

async fn wait_for_all(s: &Scheduler) -> Vec<Task> {
    for _ in 0..1_000 {
        let tasks = s.query_tasks(&TaskFilter::all()).await;
        if tasks.iter().all(settled) {
            return tasks;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("plan did not settle: {:?}", s.get_task_stats().await);
}

#[tokio::test]
async fn single_worker_dispatches_by_priority_then_fifo() {
    let h = harness();
    let submit = |activity: &str, priority: Priority| {
        NewTask::new("run-1", "telescope-1", activity).with_priority(priority)
    };
    let mut expected: Vec<TaskId> = Vec::new();
    let low = h.scheduler.schedule_task(submit("SCAN", Priority::Low)).await.unwrap();
    let n1 = h.scheduler.schedule_task(submit("BUILD", Priority::Normal)).await.unwrap();
    let crit = h.scheduler.schedule_task(submit("BUILD", Priority::Critical)).await.unwrap();
    let n2 = h.scheduler.schedule_task(submit("SCAN", Priority::Normal)).await.unwrap();
    let high = h.scheduler.schedule_task(submit("SCAN", Priority::High)).await.unwrap();
    expected.extend([crit.id, high.id, n1.id, n2.id, low.id]);

    let dispatch = spawn(&h, SimulatedController::new(), 1);
    wait_for_all(&h.scheduler).await;
    dispatch.shutdown_and_join().await;

    let started: Vec<TaskId> = h
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e.kind, TaskEventKind::Started { .. }))
        .map(|e| e.task_id)
        .collect();
    assert_eq!(started, expected);
}

#[tokio::test]
async fn mixed_plan_settles_with_retries_and_failures() {
    let h = harness();
    let ok = h
        .scheduler
        .schedule_task(NewTask::new("run-1", "telescope-1", "BUILD").with_option("target", "M31"))
        .await
        .unwrap();
    let calibrate = h
        .scheduler
        .schedule_task(NewTask::new("run-1", "telescope-1", "CALIBRATE").with_max_retries(2))
        .await
        .unwrap();
    let unknown = h
        .scheduler
        .schedule_task(NewTask::new("run-1", "telescope-1", "DANCE").with_max_retries(0))
        .await
        .unwrap();
    let cancelled = h
        .scheduler
        .schedule_task(NewTask::new("run-2", "telescope-2", "SCAN"))
        .await
        .unwrap();
    h.scheduler.cancel_task(cancelled.id, "run aborted").await.unwrap();

    let controller = SimulatedController::new()
        .with_activities(["CALIBRATE"])
        .failing_on(["CALIBRATE"])
        .with_latency(Duration::from_millis(1));
    let dispatch = spawn(&h, controller, 2);
    wait_for_all(&h.scheduler).await;
    dispatch.shutdown_and_join().await;

    let ok = h.scheduler.get_task(ok.id).await.unwrap();
    assert_eq!(ok.status, TaskStatus::Completed);
    assert_eq!(ok.retry_count, 0);

    let calibrate = h.scheduler.get_task(calibrate.id).await.unwrap();
    assert_eq!(calibrate.status, TaskStatus::Failed);
    assert_eq!(calibrate.retry_count, 2);
    assert_eq!(calibrate.error.as_deref(), Some("Calibration target not found"));

    let unknown = h.scheduler.get_task(unknown.id).await.unwrap();
    assert_eq!(unknown.status, TaskStatus::Failed);
    assert!(unknown.error.unwrap().contains("DANCE"));

    let cancelled = h.scheduler.get_task(cancelled.id).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert!(cancelled.activity_id.is_none());

    let stats = h.scheduler.get_task_stats().await;
    assert_eq!(stats.total, 4);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.in_flight(), 0);

    let retries = h
        .events
        .events()
        .iter()
        .filter(|e| e.task_id == calibrate.id && e.name() == "task_retry_scheduled")
        .count();
    assert_eq!(retries, 2);

    assert_eq!(h.snapshots.get(calibrate.id), Some(calibrate));
    assert_eq!(h.snapshots.get(ok.id), Some(ok));
}

#[tokio::test]
async fn no_task_runs_twice_concurrently() {
    let h = harness();
    let mut ids = Vec::new();
    for n in 0..20 {
        let t = h
            .scheduler
            .schedule_task(NewTask::new("run-1", "telescope-1", if n % 2 == 0 { "BUILD" } else { "SCAN" }))
            .await
            .unwrap();
        ids.push(t.id);
    }

    let dispatch = spawn(
        &h,
        SimulatedController::new().with_latency(Duration::from_millis(2)),
        4,
    );
    wait_for_all(&h.scheduler).await;
    dispatch.shutdown_and_join().await;

    for id in ids {
        let starts = h
            .events
            .events()
            .iter()
            .filter(|e| e.task_id == id && matches!(e.kind, TaskEventKind::Started { .. }))
            .count();
        assert_eq!(starts, 1, "task {id} started {starts} times");
    }
    assert_eq!(h.scheduler.get_task_stats().await.completed, 20);
}
