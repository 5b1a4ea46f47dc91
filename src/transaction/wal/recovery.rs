use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info};
use thiserror::Error;

use crate::common::{BlockId, Lsn, TxnId};
use crate::storage::buffer::{BufferError, BufferHandle, BufferManager};
use crate::storage::page::PageError;
use crate::transaction::Transaction;
use crate::transaction::wal::log_manager::{LogError, LogManager};
use crate::transaction::wal::log_record::LogRecord;

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("page error: {0}")]
    Page(#[from] PageError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// The log contains a record this build does not understand. Undo
    /// and redo semantics for it are unknowable, so the recovery pass
    /// must stop rather than skip it.
    #[error("unknown log record opcode {0}")]
    UnknownOpcode(i64),

    #[error("replay target {0} is not pinned")]
    BlockNotPinned(BlockId),

    #[error("buffer frame holds no block")]
    UnassignedFrame,
}

pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Per-transaction recovery logic: write-ahead logging of updates, and
/// the commit, rollback, and restart passes over the log.
///
/// The buffer policy is force-on-commit: commit flushes every frame the
/// transaction dirtied, after forcing the log through the commit LSN.
/// The redo pass does not depend on that: it reapplies committed
/// updates idempotently, so it would be equally correct under no-force.
#[derive(Clone)]
pub(crate) struct RecoveryManager {
    lm: Arc<LogManager>,
    bm: Arc<BufferManager>,
    txn: TxnId,
}

impl RecoveryManager {
    /// Bind to a transaction, writing its START record.
    pub(crate) fn new(lm: Arc<LogManager>, bm: Arc<BufferManager>, txn: TxnId) -> Result<Self> {
        let rm = Self { lm, bm, txn };
        rm.append(&LogRecord::Start { txn })?;
        Ok(rm)
    }

    /// Log an integer update about to be applied to `handle`. Returns
    /// the record's LSN; the caller must observe it before mutating the
    /// page (write-ahead ordering).
    pub(crate) fn set_int(
        &self,
        handle: &BufferHandle,
        offset: usize,
        new_val: i64,
    ) -> Result<Lsn> {
        let frame = handle.read();
        let old_val = frame.contents().get_int(offset)?;
        let blk = frame.block().ok_or(RecoveryError::UnassignedFrame)?.clone();
        drop(frame);
        self.append(&LogRecord::SetInt {
            txn: self.txn,
            blk,
            offset,
            old_val,
            new_val,
        })
    }

    /// Log a string update about to be applied to `handle`.
    pub(crate) fn set_string(
        &self,
        handle: &BufferHandle,
        offset: usize,
        new_val: &str,
    ) -> Result<Lsn> {
        let frame = handle.read();
        let old_val = frame.contents().get_string(offset)?;
        let blk = frame.block().ok_or(RecoveryError::UnassignedFrame)?.clone();
        drop(frame);
        self.append(&LogRecord::SetString {
            txn: self.txn,
            blk,
            offset,
            old_val,
            new_val: new_val.to_string(),
        })
    }

    /// Finish the transaction: log COMMIT, force its dirty pages, and
    /// force the log through the commit LSN.
    pub(crate) fn commit(&self) -> Result<()> {
        let lsn = self.append(&LogRecord::Commit { txn: self.txn })?;
        self.bm.flush_all(self.txn)?;
        self.lm.flush(lsn)?;
        info!("transaction {} committed at lsn {}", self.txn, lsn);
        Ok(())
    }

    /// Abort the transaction: log ROLLBACK, force it, then walk the log
    /// backward undoing every update this transaction made, stopping at
    /// its own START record.
    pub(crate) fn rollback(&self, tx: &mut Transaction) -> Result<()> {
        let lsn = self.append(&LogRecord::Rollback { txn: self.txn })?;
        self.lm.flush(lsn)?;

        let mut iter = self.lm.iterator()?;
        while let Some(bytes) = iter.next_record()? {
            let record = LogRecord::decode(&bytes)?;
            if record.txn() != Some(self.txn) {
                continue;
            }
            if matches!(record, LogRecord::Start { .. }) {
                break;
            }
            record.undo(tx)?;
        }

        self.bm.flush_all(self.txn)?;
        info!("transaction {} rolled back", self.txn);
        Ok(())
    }

    /// Restart recovery. Walks the log backward from the tail: updates
    /// of transactions with no COMMIT or ROLLBACK record are undone as
    /// they are encountered (newest first); updates of committed
    /// transactions are collected and then redone in original log order
    /// (oldest first). Updates of rolled-back transactions are left
    /// alone: the rollback already restored their before-images, and
    /// redoing them would resurrect the aborted values. The scan stops
    /// at a CHECKPOINT record. Completion is marked by a fresh
    /// CHECKPOINT so the next restart scans no further back than this
    /// one.
    pub(crate) fn recover(&self, tx: &mut Transaction) -> Result<()> {
        let mut committed: HashSet<TxnId> = HashSet::new();
        let mut rolled_back: HashSet<TxnId> = HashSet::new();
        let mut redo_list: Vec<LogRecord> = Vec::new();
        let mut undone = 0usize;

        let mut iter = self.lm.iterator()?;
        while let Some(bytes) = iter.next_record()? {
            let record = LogRecord::decode(&bytes)?;
            match &record {
                LogRecord::Checkpoint => break,
                LogRecord::Commit { txn } => {
                    committed.insert(*txn);
                }
                LogRecord::Rollback { txn } => {
                    rolled_back.insert(*txn);
                }
                LogRecord::Start { .. } => {}
                LogRecord::SetInt { txn, .. } | LogRecord::SetString { txn, .. } => {
                    // The backward scan meets a transaction's finish
                    // record before any of its updates, so membership in
                    // these sets is already settled here.
                    if committed.contains(txn) {
                        redo_list.push(record);
                    } else if !rolled_back.contains(txn) {
                        record.undo(tx)?;
                        undone += 1;
                    }
                }
            }
        }

        for record in redo_list.iter().rev() {
            record.redo(tx)?;
        }
        debug!(
            "recovery undid {} and redid {} updates",
            undone,
            redo_list.len()
        );

        self.bm.flush_all(self.txn)?;
        let lsn = self.append(&LogRecord::Checkpoint)?;
        self.lm.flush(lsn)?;
        info!("recovery complete, checkpoint at lsn {}", lsn);
        Ok(())
    }

    fn append(&self, record: &LogRecord) -> Result<Lsn> {
        Ok(self.lm.append(&record.encode()?)?)
    }
}
