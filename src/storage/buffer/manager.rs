use std::sync::Arc;
use std::time::Instant;

use log::debug;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::common::{BlockId, TxnId, WaitConfig};
use crate::storage::buffer::error::{BufferError, Result};
use crate::storage::buffer::frame::Buffer;
use crate::storage::file::FileManager;
use crate::transaction::wal::log_manager::LogManager;

/// Shared handle to a pinned buffer frame.
pub type BufferHandle = Arc<RwLock<Buffer>>;

/// A fixed pool of buffer frames mapping disk blocks to in-memory pages.
///
/// All frame-state transitions (pin, unpin, reassignment) happen under
/// one pool-wide mutex guarding the available-frame count, so the
/// invariant `available == frames with pin count 0` holds at all times.
/// Replacement is naive: the first unpinned frame found is the victim.
/// When every frame is pinned, `pin` waits on a condvar up to the
/// configured timeout and then fails with `NoAvailableBuffer`.
pub struct BufferManager {
    pool: Vec<BufferHandle>,
    available: Mutex<usize>,
    cond: Condvar,
    wait: WaitConfig,
}

impl BufferManager {
    pub fn new(
        fm: Arc<FileManager>,
        lm: Arc<LogManager>,
        pool_size: usize,
        wait: WaitConfig,
    ) -> Self {
        let pool = (0..pool_size)
            .map(|_| Arc::new(RwLock::new(Buffer::new(Arc::clone(&fm), Arc::clone(&lm)))))
            .collect();
        Self {
            pool,
            available: Mutex::new(pool_size),
            cond: Condvar::new(),
            wait,
        }
    }

    /// Number of frames currently unpinned.
    pub fn available(&self) -> usize {
        *self.available.lock()
    }

    /// Pin `blk` into a frame, reading it from disk if it is not already
    /// resident, and return a handle to the frame. Blocks while the pool
    /// is exhausted; fails with `NoAvailableBuffer` after the wait
    /// timeout.
    pub fn pin(&self, blk: &BlockId) -> Result<BufferHandle> {
        let deadline = Instant::now() + self.wait.timeout;
        let mut available = self.available.lock();
        loop {
            if let Some(handle) = self.try_pin(blk, &mut available)? {
                return Ok(handle);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("pin of {} timed out with all frames pinned", blk);
                return Err(BufferError::NoAvailableBuffer);
            }
            let wait_for = self.wait.poll_interval.min(deadline - now);
            self.cond.wait_for(&mut available, wait_for);
        }
    }

    /// Release one pin on the frame. On the last pin the frame becomes a
    /// replacement candidate and any pinners blocked on a full pool are
    /// woken.
    pub fn unpin(&self, handle: &BufferHandle) {
        let mut available = self.available.lock();
        let mut frame = handle.write();
        frame.unpin();
        if !frame.is_pinned() {
            *available += 1;
            self.cond.notify_all();
        }
    }

    /// Force every frame dirtied by `txn` to disk.
    pub fn flush_all(&self, txn: TxnId) -> Result<()> {
        let _guard = self.available.lock();
        for handle in &self.pool {
            let mut frame = handle.write();
            if frame.modifying_txn() == Some(txn) {
                frame.flush()?;
            }
        }
        Ok(())
    }

    /// One pin attempt under the pool mutex: reuse the resident frame if
    /// the block is already in the pool, otherwise claim an unpinned
    /// frame and read the block into it. `None` means the pool is
    /// currently exhausted.
    fn try_pin(&self, blk: &BlockId, available: &mut usize) -> Result<Option<BufferHandle>> {
        let handle = match self.find_existing(blk) {
            Some(handle) => handle,
            None => match self.choose_unpinned() {
                Some(handle) => {
                    handle.write().assign_to_block(blk.clone())?;
                    handle
                }
                None => return Ok(None),
            },
        };

        let mut frame = handle.write();
        if !frame.is_pinned() {
            *available -= 1;
        }
        frame.pin();
        drop(frame);
        Ok(Some(handle))
    }

    fn find_existing(&self, blk: &BlockId) -> Option<BufferHandle> {
        self.pool
            .iter()
            .find(|handle| handle.read().block() == Some(blk))
            .cloned()
    }

    fn choose_unpinned(&self) -> Option<BufferHandle> {
        self.pool
            .iter()
            .find(|handle| !handle.read().is_pinned())
            .cloned()
    }
}
