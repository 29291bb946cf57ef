mod concurrency_manager;
mod lock_table;

pub use concurrency_manager::{ConcurrencyManager, LockMode};
pub use lock_table::LockTable;
