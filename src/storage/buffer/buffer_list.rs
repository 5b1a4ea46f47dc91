use std::collections::HashMap;
use std::sync::Arc;

use crate::common::BlockId;
use crate::storage::buffer::error::Result;
use crate::storage::buffer::manager::{BufferHandle, BufferManager};

/// The set of blocks a single transaction currently has pinned.
///
/// Pins are reference-counted per block, so a transaction that pins the
/// same block twice only releases it from the global pool when its own
/// count returns to zero.
pub(crate) struct BufferList {
    bm: Arc<BufferManager>,
    buffers: HashMap<BlockId, BufferHandle>,
    pins: HashMap<BlockId, usize>,
}

impl BufferList {
    pub(crate) fn new(bm: Arc<BufferManager>) -> Self {
        Self {
            bm,
            buffers: HashMap::new(),
            pins: HashMap::new(),
        }
    }

    pub(crate) fn buffer(&self, blk: &BlockId) -> Option<&BufferHandle> {
        self.buffers.get(blk)
    }

    pub(crate) fn pin(&mut self, blk: &BlockId) -> Result<()> {
        let handle = self.bm.pin(blk)?;
        self.buffers.insert(blk.clone(), handle);
        *self.pins.entry(blk.clone()).or_insert(0) += 1;
        Ok(())
    }

    pub(crate) fn unpin(&mut self, blk: &BlockId) {
        let Some(count) = self.pins.get_mut(blk) else {
            return;
        };
        if let Some(handle) = self.buffers.get(blk) {
            self.bm.unpin(handle);
        }
        *count -= 1;
        if *count == 0 {
            self.pins.remove(blk);
            self.buffers.remove(blk);
        }
    }

    /// Drop every pin this transaction still holds. Called once at
    /// transaction end.
    pub(crate) fn unpin_all(&mut self) {
        for (blk, count) in self.pins.drain() {
            if let Some(handle) = self.buffers.get(&blk) {
                for _ in 0..count {
                    self.bm.unpin(handle);
                }
            }
        }
        self.buffers.clear();
    }
}
