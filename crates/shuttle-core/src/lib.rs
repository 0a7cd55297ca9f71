//! shuttle-core
//!
//! Priority task scheduler for automated laboratory experiment runs.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, priority, state, task, spec, events, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, Clock, IdGenerator, EventSink, SnapshotStore, Controller）
//! - **store**: InMemoryTaskStore と選択・検索・リトライ計算
//! - **app**: Scheduler, SchedulerBuilder, DispatchLoop
//! - **impls**: 開発用・テスト用の ports 実装
//! - **config**: 設定（リトライ間隔、ワーカー数など）
//! - **observability**: 状態ごとの集計

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod store;

pub use app::{DispatchLoop, Scheduler, SchedulerBuilder};
pub use config::{Config, DispatchConfig, SchedulerConfig};
pub use domain::{NewTask, Priority, SchedulerError, Task, TaskId, TaskStatus, TaskUpdate};
pub use observability::TaskStats;
