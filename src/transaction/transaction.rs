use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::common::{BlockId, BlockNum, END_OF_FILE, TxnId};
use crate::storage::buffer::buffer_list::BufferList;
use crate::storage::buffer::{BufferError, BufferManager};
use crate::storage::file::{FileManager, FileManagerError};
use crate::storage::page::PageError;
use crate::transaction::concurrency::{ConcurrencyManager, LockError, LockTable};
use crate::transaction::wal::log_manager::LogManager;
use crate::transaction::wal::recovery::{RecoveryError, RecoveryManager};

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("page error: {0}")]
    Page(#[from] PageError),

    #[error("recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("file manager error: {0}")]
    File(#[from] FileManagerError),

    /// The caller accessed a block it never pinned; pinning is the
    /// caller's responsibility and must precede any field access.
    #[error("block {0} is not pinned by this transaction")]
    BlockNotPinned(BlockId),
}

pub type Result<T> = std::result::Result<T, TransactionError>;

/// A single transaction: the client-facing façade over the buffer pool,
/// lock table, and write-ahead log.
///
/// Field reads take a shared lock on the block; writes take an exclusive
/// lock and append a before/after log record *before* the in-memory page
/// is changed. `commit` and `rollback` consume the transaction, so the
/// type system enforces that a finished transaction cannot be touched
/// again. Pins, locks, and the transaction number are all released or
/// retired exactly once, at that point.
pub struct Transaction {
    txnum: TxnId,
    fm: Arc<FileManager>,
    bm: Arc<BufferManager>,
    recovery: RecoveryManager,
    concurrency: ConcurrencyManager,
    buffers: BufferList,
}

impl Transaction {
    /// Begin a transaction. Writes its START record.
    pub(crate) fn new(
        fm: Arc<FileManager>,
        lm: Arc<LogManager>,
        bm: Arc<BufferManager>,
        lock_table: Arc<LockTable>,
        txnum: TxnId,
    ) -> Result<Self> {
        let recovery = RecoveryManager::new(lm, Arc::clone(&bm), txnum)?;
        Ok(Self {
            txnum,
            fm,
            buffers: BufferList::new(Arc::clone(&bm)),
            bm,
            recovery,
            concurrency: ConcurrencyManager::new(lock_table),
        })
    }

    pub fn id(&self) -> TxnId {
        self.txnum
    }

    /// Pin `blk` into the buffer pool on this transaction's behalf.
    pub fn pin(&mut self, blk: &BlockId) -> std::result::Result<(), BufferError> {
        self.buffers.pin(blk)
    }

    /// Release one of this transaction's pins on `blk`.
    pub fn unpin(&mut self, blk: &BlockId) {
        self.buffers.unpin(blk);
    }

    /// Read an integer from a pinned block, under a shared lock.
    pub fn get_int(&mut self, blk: &BlockId, offset: usize) -> Result<i64> {
        self.concurrency.slock(blk)?;
        let handle = self
            .buffers
            .buffer(blk)
            .ok_or_else(|| TransactionError::BlockNotPinned(blk.clone()))?;
        Ok(handle.read().contents().get_int(offset)?)
    }

    /// Read a string from a pinned block, under a shared lock.
    pub fn get_string(&mut self, blk: &BlockId, offset: usize) -> Result<String> {
        self.concurrency.slock(blk)?;
        let handle = self
            .buffers
            .buffer(blk)
            .ok_or_else(|| TransactionError::BlockNotPinned(blk.clone()))?;
        Ok(handle.read().contents().get_string(offset)?)
    }

    /// Write an integer to a pinned block: exclusive lock, then log the
    /// before/after images, then mutate the page and mark the frame
    /// dirty with the record's LSN.
    pub fn set_int(&mut self, blk: &BlockId, offset: usize, val: i64) -> Result<()> {
        self.concurrency.xlock(blk)?;
        let handle = self
            .buffers
            .buffer(blk)
            .cloned()
            .ok_or_else(|| TransactionError::BlockNotPinned(blk.clone()))?;
        let lsn = self.recovery.set_int(&handle, offset, val)?;
        let mut frame = handle.write();
        frame.contents_mut().set_int(offset, val)?;
        frame.set_modified(self.txnum, Some(lsn));
        Ok(())
    }

    /// Write a string to a pinned block. Same protocol as `set_int`.
    pub fn set_string(&mut self, blk: &BlockId, offset: usize, val: &str) -> Result<()> {
        self.concurrency.xlock(blk)?;
        let handle = self
            .buffers
            .buffer(blk)
            .cloned()
            .ok_or_else(|| TransactionError::BlockNotPinned(blk.clone()))?;
        let lsn = self.recovery.set_string(&handle, offset, val)?;
        let mut frame = handle.write();
        frame.contents_mut().set_string(offset, val)?;
        frame.set_modified(self.txnum, Some(lsn));
        Ok(())
    }

    /// Commit: log COMMIT, force this transaction's pages and the log,
    /// then release all locks and pins.
    pub fn commit(mut self) -> Result<()> {
        self.recovery.commit()?;
        self.finish();
        Ok(())
    }

    /// Roll back: undo every change this transaction made, then release
    /// all locks and pins.
    pub fn rollback(mut self) -> Result<()> {
        let recovery = self.recovery.clone();
        recovery.rollback(&mut self)?;
        self.finish();
        Ok(())
    }

    /// Run restart recovery using this transaction as the pin/replay
    /// vehicle. Must complete before any client transaction starts.
    pub(crate) fn recover(mut self) -> Result<()> {
        let recovery = self.recovery.clone();
        recovery.recover(&mut self)?;
        self.finish();
        Ok(())
    }

    /// Number of blocks in `filename`, under a shared lock on the file's
    /// end-of-file sentinel so the size cannot change underneath the
    /// reader.
    pub fn size(&mut self, filename: &str) -> Result<BlockNum> {
        self.concurrency
            .slock(&BlockId::new(filename, END_OF_FILE))?;
        Ok(self.fm.length(filename)?)
    }

    /// Grow `filename` by one block, under an exclusive lock on its
    /// end-of-file sentinel.
    pub fn append(&mut self, filename: &str) -> Result<BlockId> {
        self.concurrency
            .xlock(&BlockId::new(filename, END_OF_FILE))?;
        Ok(self.fm.append(filename)?)
    }

    pub fn block_size(&self) -> usize {
        self.fm.block_size()
    }

    pub fn available_buffers(&self) -> usize {
        self.bm.available()
    }

    /// Unlogged integer write used by undo/redo. The caller has pinned
    /// `blk`; no lock is taken and no record is appended, since replay
    /// restores history rather than creating it.
    pub(crate) fn apply_int(
        &mut self,
        blk: &BlockId,
        offset: usize,
        val: i64,
    ) -> std::result::Result<(), RecoveryError> {
        let handle = self
            .buffers
            .buffer(blk)
            .ok_or_else(|| RecoveryError::BlockNotPinned(blk.clone()))?;
        let mut frame = handle.write();
        frame.contents_mut().set_int(offset, val)?;
        frame.set_modified(self.txnum, None);
        Ok(())
    }

    /// Unlogged string write used by undo/redo.
    pub(crate) fn apply_string(
        &mut self,
        blk: &BlockId,
        offset: usize,
        val: &str,
    ) -> std::result::Result<(), RecoveryError> {
        let handle = self
            .buffers
            .buffer(blk)
            .ok_or_else(|| RecoveryError::BlockNotPinned(blk.clone()))?;
        let mut frame = handle.write();
        frame.contents_mut().set_string(offset, val)?;
        frame.set_modified(self.txnum, None);
        Ok(())
    }

    fn finish(&mut self) {
        self.concurrency.release();
        self.buffers.unpin_all();
        info!("transaction {} finished", self.txnum);
    }
}

impl Drop for Transaction {
    /// Safety net for abandoned transactions: locks and pins are handed
    /// back so other transactions are not starved. The releases are
    /// idempotent, so a normally finished transaction drops cleanly too.
    fn drop(&mut self) {
        self.concurrency.release();
        self.buffers.unpin_all();
    }
}
