use thiserror::Error;

use crate::storage::file::FileManagerError;
use crate::transaction::wal::log_manager::LogError;

#[derive(Error, Debug)]
pub enum BufferError {
    /// Every frame stayed pinned for the whole wait window. The caller
    /// should roll back and may retry later.
    #[error("no available buffer frame")]
    NoAvailableBuffer,

    #[error("file manager error: {0}")]
    File(#[from] FileManagerError),

    #[error("log error: {0}")]
    Log(#[from] LogError),
}

pub type Result<T> = std::result::Result<T, BufferError>;
