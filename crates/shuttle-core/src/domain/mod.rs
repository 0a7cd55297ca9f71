//! Domain model (IDs, priority, status, task record, specs, events, errors).

pub mod errors;
pub mod events;
pub mod ids;
pub mod priority;
pub mod spec;
pub mod state;
pub mod task;

pub use errors::{ErrorKind, Result, SchedulerError};
pub use events::{TaskEvent, TaskEventKind};
pub use ids::{ActivityId, ControllerId, ExperimentRunId, TaskId};
pub use priority::Priority;
pub use spec::{ActivityOption, NewTask, TaskUpdate};
pub use state::TaskStatus;
pub use task::Task;
