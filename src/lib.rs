// stratadb: transactional storage core
//
// A single-node, disk-based storage engine: fixed-size block files, a
// write-ahead log, a pinned buffer pool, block-level two-phase locking,
// and undo/redo crash recovery, composed behind a per-transaction
// façade. Clients open a `Transaction` from the `StorageEngine`, pin
// blocks, and read/write typed fields; commit, rollback, and restart
// recovery preserve atomicity and durability.

pub mod common;
pub mod storage;
pub mod transaction;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use log::info;
use thiserror::Error;

use crate::common::WaitConfig;
use crate::storage::buffer::BufferManager;
use crate::storage::file::{FileManager, FileManagerError};
use crate::transaction::concurrency::LockTable;
use crate::transaction::transaction::{Transaction, TransactionError};
use crate::transaction::wal::log_manager::{LogError, LogManager};

// Re-export the types a client needs day to day.
pub use crate::common::{BlockId, BlockNum, Lsn, TxnId};
pub use crate::storage::buffer::BufferError;
pub use crate::storage::page::{Page, PageError};
pub use crate::transaction::concurrency::LockError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("file manager error: {0}")]
    File(#[from] FileManagerError),

    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Size of every disk block and in-memory page, in bytes.
    pub block_size: usize,
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// Name of the write-ahead log file inside the database directory.
    pub log_file: String,
    /// Wait behavior for buffer pins and block locks.
    pub wait: WaitConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            block_size: 4096,
            pool_size: 64,
            log_file: "logfile".to_string(),
            wait: WaitConfig::default(),
        }
    }
}

/// The composition root: one file manager, log manager, buffer pool, and
/// lock table, shared by every transaction, plus the process-wide
/// transaction counter.
pub struct StorageEngine {
    fm: Arc<FileManager>,
    lm: Arc<LogManager>,
    bm: Arc<BufferManager>,
    lock_table: Arc<LockTable>,
    next_txn: AtomicI64,
}

impl StorageEngine {
    /// Open (or create) a database in `db_dir`. On an existing database
    /// the caller should run `recover` before starting transactions.
    pub fn new(db_dir: impl AsRef<Path>, config: StorageConfig) -> Result<Self, StorageError> {
        let fm = Arc::new(FileManager::new(db_dir, config.block_size)?);
        let lm = Arc::new(LogManager::new(Arc::clone(&fm), config.log_file)?);
        let bm = Arc::new(BufferManager::new(
            Arc::clone(&fm),
            Arc::clone(&lm),
            config.pool_size,
            config.wait.clone(),
        ));
        let lock_table = Arc::new(LockTable::new(config.wait));

        info!(
            "storage engine opened ({} database)",
            if fm.is_new() { "new" } else { "existing" }
        );
        Ok(Self {
            fm,
            lm,
            bm,
            lock_table,
            next_txn: AtomicI64::new(1),
        })
    }

    /// Begin a new transaction with a fresh transaction number.
    pub fn new_transaction(&self) -> Result<Transaction, StorageError> {
        let txnum = self.next_txn.fetch_add(1, Ordering::SeqCst);
        Ok(Transaction::new(
            Arc::clone(&self.fm),
            Arc::clone(&self.lm),
            Arc::clone(&self.bm),
            Arc::clone(&self.lock_table),
            txnum,
        )?)
    }

    /// Run restart recovery: undo unfinished transactions, redo
    /// committed ones, and write a fresh checkpoint. Must run before the
    /// first client transaction on an existing database.
    pub fn recover(&self) -> Result<(), StorageError> {
        let tx = self.new_transaction()?;
        tx.recover()?;
        Ok(())
    }

    pub fn file_manager(&self) -> &Arc<FileManager> {
        &self.fm
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.lm
    }

    pub fn buffer_manager(&self) -> &Arc<BufferManager> {
        &self.bm
    }

    pub fn block_size(&self) -> usize {
        self.fm.block_size()
    }
}
