pub mod lock_table;
pub(crate) mod manager;

pub use lock_table::{LockError, LockTable};
pub(crate) use manager::ConcurrencyManager;
