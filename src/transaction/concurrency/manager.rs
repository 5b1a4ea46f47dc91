use std::collections::HashMap;
use std::sync::Arc;

use crate::common::BlockId;
use crate::transaction::concurrency::lock_table::{LockTable, Result};

/// Strongest lock mode a transaction holds on a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// A transaction's private view of the global lock table.
///
/// Tracks the strongest mode this transaction holds per block so that
/// repeated requests for the same or a weaker mode never touch the
/// table, and so every claim can be handed back in one pass at
/// transaction end.
pub(crate) struct ConcurrencyManager {
    lock_table: Arc<LockTable>,
    locks: HashMap<BlockId, LockMode>,
}

impl ConcurrencyManager {
    pub(crate) fn new(lock_table: Arc<LockTable>) -> Self {
        Self {
            lock_table,
            locks: HashMap::new(),
        }
    }

    /// Take a shared lock on `blk`. A no-op if this transaction already
    /// holds any lock on the block.
    pub(crate) fn slock(&mut self, blk: &BlockId) -> Result<()> {
        if self.locks.contains_key(blk) {
            return Ok(());
        }
        self.lock_table.slock(blk)?;
        self.locks.insert(blk.clone(), LockMode::Shared);
        Ok(())
    }

    /// Take an exclusive lock on `blk`, upgrading through a shared lock
    /// first. A no-op if this transaction already holds X.
    pub(crate) fn xlock(&mut self, blk: &BlockId) -> Result<()> {
        if self.locks.get(blk) == Some(&LockMode::Exclusive) {
            return Ok(());
        }
        self.slock(blk)?;
        self.lock_table.xlock(blk)?;
        self.locks.insert(blk.clone(), LockMode::Exclusive);
        Ok(())
    }

    /// Release every lock this transaction holds. Called exactly once,
    /// at commit or rollback.
    pub(crate) fn release(&mut self) {
        for blk in self.locks.keys() {
            self.lock_table.unlock(blk);
        }
        self.locks.clear();
    }
}
