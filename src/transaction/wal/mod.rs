pub mod log_iterator;
pub mod log_manager;
pub mod log_record;
pub mod recovery;

pub use log_iterator::LogIterator;
pub use log_manager::{LogError, LogManager};
pub use log_record::LogRecord;
pub use recovery::RecoveryError;
