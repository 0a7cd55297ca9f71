//! Store module: retry policy, selection, queries, and the in-memory task store.

mod memory;
mod query;
mod retry;
mod selector;

pub use memory::InMemoryTaskStore;
pub use query::{TaskFilter, collect_stats, filter_tasks};
pub use retry::RetryPolicy;
pub use selector::{DispatchRank, select_next};
