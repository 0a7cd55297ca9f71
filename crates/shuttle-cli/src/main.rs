//! shuttle - run an experiment plan against the simulated controller

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use shuttle_core::impls::SimulatedController;
use shuttle_core::ports::{IdGenerator, SystemClock, UlidGenerator};
use shuttle_core::store::TaskFilter;
use shuttle_core::{
    Config, DispatchLoop, NewTask, Scheduler, Task, TaskStats, TaskStatus,
};

#[derive(Parser)]
#[command(name = "shuttle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule every task in a plan and dispatch until all of them settle
    Run {
        /// JSON array of task submissions
        #[arg(short, long)]
        plan: PathBuf,

        /// JSON config file (scheduler + dispatch sections)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of dispatch workers (overrides the config file)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Activity names the simulated controller always fails
        #[arg(long = "fail", value_name = "ACTIVITY")]
        fail: Vec<String>,
    },

    /// Print the effective default configuration
    Config,
}

#[derive(Serialize)]
struct RunReport {
    stats: TaskStats,
    tasks: Vec<Task>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            plan,
            config,
            workers,
            fail,
        } => run(&plan, config.as_deref(), workers, fail).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&Config::default())?);
            Ok(())
        }
    }
}

async fn run(
    plan: &Path,
    config: Option<&Path>,
    workers: Option<usize>,
    fail: Vec<String>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Config::from_json(&raw)?
        }
        None => Config::default(),
    };
    if let Some(n) = workers {
        config.dispatch.workers = n;
    }
    config.validate()?;

    let raw = std::fs::read_to_string(plan)
        .with_context(|| format!("reading plan {}", plan.display()))?;
    let submissions: Vec<NewTask> =
        serde_json::from_str(&raw).with_context(|| format!("parsing plan {}", plan.display()))?;

    let scheduler = Arc::new(
        Scheduler::builder()
            .config(config.scheduler.clone())
            .build()?,
    );
    for spec in submissions {
        scheduler.schedule_task(spec).await?;
    }

    let controller = SimulatedController::new()
        .with_activities(fail.iter().cloned())
        .failing_on(fail);
    let id_gen: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));
    let retry_failed = config.dispatch.retry_failed;
    let poll = config.dispatch.poll_interval();
    let dispatch = DispatchLoop::spawn(
        Arc::clone(&scheduler),
        Arc::new(controller),
        id_gen,
        config.dispatch,
    );

    tokio::select! {
        _ = wait_until_settled(&scheduler, retry_failed, poll) => {
            info!("all tasks settled");
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            warn!("interrupted, stopping dispatch");
        }
    }
    dispatch.shutdown_and_join().await;

    let report = RunReport {
        stats: scheduler.get_task_stats().await,
        tasks: scheduler.query_tasks(&TaskFilter::all()).await,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// A task is settled once nothing will move it again: terminal, or failed
/// with no retry coming.
fn is_settled(task: &Task, retry_failed: bool) -> bool {
    match task.status {
        TaskStatus::Completed | TaskStatus::Cancelled => true,
        TaskStatus::Failed => !retry_failed || task.retries_remaining() == 0,
        TaskStatus::Pending | TaskStatus::Scheduled | TaskStatus::Running => false,
    }
}

async fn wait_until_settled(scheduler: &Scheduler, retry_failed: bool, poll: Duration) {
    loop {
        let tasks = scheduler.query_tasks(&TaskFilter::all()).await;
        if tasks.iter().all(|t| is_settled(t, retry_failed)) {
            return;
        }
        tokio::time::sleep(poll).await;
    }
}
