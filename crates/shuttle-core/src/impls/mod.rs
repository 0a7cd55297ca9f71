//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryEventSink**: 送られた TaskEvent を順に保持
//! - **InMemorySnapshotStore**: Task ごとの最新スナップショットを JSON で保持
//! - **SimulatedController**: 実機なしで activity を実行するコントローラ
//!
//! InMemoryTaskStore は `store` モジュールにあります。

pub mod memory_sink;
pub mod memory_snapshots;
pub mod simulated_controller;

pub use self::memory_sink::InMemoryEventSink;
pub use self::memory_snapshots::InMemorySnapshotStore;
pub use self::simulated_controller::SimulatedController;
