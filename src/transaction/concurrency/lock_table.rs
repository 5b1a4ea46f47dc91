use std::collections::HashMap;
use std::time::Instant;

use log::debug;
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::common::{BlockId, WaitConfig};

#[derive(Error, Debug)]
pub enum LockError {
    /// The lock could not be acquired within the wait window. Two
    /// transactions caught in a lock cycle both hit this instead of
    /// hanging; timing out and aborting is the deadlock strategy.
    #[error("lock on {0} not available")]
    Timeout(BlockId),
}

pub type Result<T> = std::result::Result<T, LockError>;

/// The global block-level lock table shared by all transactions.
///
/// Each entry is a single integer: 0 or absent means unlocked, -1 means
/// exclusively locked, and n > 0 means n concurrent shared holders.
/// Holder identity is not tracked here; the per-transaction
/// `ConcurrencyManager` knows which mode its transaction holds and only
/// goes to the table for genuine state changes.
pub struct LockTable {
    locks: Mutex<HashMap<BlockId, i64>>,
    cond: Condvar,
    wait: WaitConfig,
}

impl LockTable {
    pub fn new(wait: WaitConfig) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            cond: Condvar::new(),
            wait,
        }
    }

    /// Acquire a shared lock on `blk`, waiting out any exclusive holder
    /// up to the configured timeout.
    pub fn slock(&self, blk: &BlockId) -> Result<()> {
        let deadline = Instant::now() + self.wait.timeout;
        let mut locks = self.locks.lock();
        loop {
            let val = locks.get(blk).copied().unwrap_or(0);
            if val >= 0 {
                locks.insert(blk.clone(), val + 1);
                return Ok(());
            }
            if !self.wait_until(&mut locks, deadline) {
                debug!("shared lock on {} timed out", blk);
                return Err(LockError::Timeout(blk.clone()));
            }
        }
    }

    /// Upgrade to an exclusive lock on `blk`. The caller must already
    /// hold a shared lock, so its own claim accounts for a value of 1;
    /// the upgrade waits until no other transaction shares the block.
    pub fn xlock(&self, blk: &BlockId) -> Result<()> {
        let deadline = Instant::now() + self.wait.timeout;
        let mut locks = self.locks.lock();
        loop {
            let val = locks.get(blk).copied().unwrap_or(0);
            if val <= 1 {
                locks.insert(blk.clone(), -1);
                return Ok(());
            }
            if !self.wait_until(&mut locks, deadline) {
                debug!("exclusive lock on {} timed out", blk);
                return Err(LockError::Timeout(blk.clone()));
            }
        }
    }

    /// Release one claim on `blk`: drop a shared holder, or clear the
    /// entry (shared-by-one or exclusive) and wake every waiter.
    pub fn unlock(&self, blk: &BlockId) {
        let mut locks = self.locks.lock();
        let val = locks.get(blk).copied().unwrap_or(0);
        if val > 1 {
            locks.insert(blk.clone(), val - 1);
        } else {
            locks.remove(blk);
            self.cond.notify_all();
        }
    }

    /// Wait for an unlock notification. Returns false once the deadline
    /// has passed.
    fn wait_until(
        &self,
        locks: &mut parking_lot::MutexGuard<'_, HashMap<BlockId, i64>>,
        deadline: Instant,
    ) -> bool {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let wait_for = self.wait.poll_interval.min(deadline - now);
        self.cond.wait_for(locks, wait_for);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quick_table() -> LockTable {
        LockTable::new(WaitConfig {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(50),
        })
    }

    #[test]
    fn shared_locks_accumulate() {
        let table = quick_table();
        let blk = BlockId::new("f", 0);
        table.slock(&blk).unwrap();
        table.slock(&blk).unwrap();
        assert_eq!(*table.locks.lock().get(&blk).unwrap(), 2);

        table.unlock(&blk);
        assert_eq!(*table.locks.lock().get(&blk).unwrap(), 1);
        table.unlock(&blk);
        assert!(table.locks.lock().get(&blk).is_none());
    }

    #[test]
    fn xlock_blocks_slock_until_timeout() {
        let table = quick_table();
        let blk = BlockId::new("f", 0);
        // Simulate another transaction holding X.
        table.slock(&blk).unwrap();
        table.xlock(&blk).unwrap();

        assert!(matches!(table.slock(&blk), Err(LockError::Timeout(_))));
        table.unlock(&blk);
        table.slock(&blk).unwrap();
    }

    #[test]
    fn upgrade_waits_for_other_sharers() {
        let table = quick_table();
        let blk = BlockId::new("f", 1);
        table.slock(&blk).unwrap(); // this transaction
        table.slock(&blk).unwrap(); // another one

        // Upgrade cannot proceed while the other sharer remains.
        assert!(matches!(table.xlock(&blk), Err(LockError::Timeout(_))));

        table.unlock(&blk);
        table.xlock(&blk).unwrap();
        assert_eq!(*table.locks.lock().get(&blk).unwrap(), -1);
    }
}
