//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（永続化、イベント配信、装置コントローラなど）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod controller;
pub mod event_sink;
pub mod id_generator;
pub mod snapshot_store;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::controller::{ActivityReport, ActivityStatus, Controller, ControllerError};
pub use self::event_sink::{EventSink, EventSinkError, NoopEventSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::snapshot_store::{NoopSnapshotStore, SnapshotError, SnapshotStore};
pub use self::task_store::{TaskStore, Transition};
