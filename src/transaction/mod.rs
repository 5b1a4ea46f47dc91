pub mod concurrency;
pub mod transaction;
pub mod wal;

pub use concurrency::{LockError, LockTable};
pub use transaction::{Transaction, TransactionError};
pub use wal::{LogManager, LogRecord, RecoveryError};
