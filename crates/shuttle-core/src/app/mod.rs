//! App - アプリケーション層
//!
//! ports を組み合わせてスケジューラの操作を実装します。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: Scheduler の構築とワイヤリング
//! - **Scheduler**: Task のライフサイクル操作（schedule / start / complete / fail / retry / cancel）
//! - **DispatchLoop**: タスク実行ループ（select→claim→run→report→retry）

pub mod builder;
pub mod dispatch_loop;
pub mod scheduler;

pub use self::builder::SchedulerBuilder;
pub use self::dispatch_loop::DispatchLoop;
pub use self::scheduler::Scheduler;
