use std::sync::Arc;

use crate::common::BlockId;
use crate::storage::file::FileManager;
use crate::storage::page::{INT_SIZE, Page};
use crate::transaction::wal::log_manager::Result;

/// Walks durable log records in reverse chronological order: blocks from
/// the highest-numbered down to block 0, and within a block from the
/// boundary offset forward. Because records are packed backward from the
/// block's end at append time, that forward in-block scan yields the most
/// recently appended record first.
pub struct LogIterator {
    fm: Arc<FileManager>,
    blk: BlockId,
    page: Page,
    current_pos: usize,
}

impl LogIterator {
    pub(crate) fn new(fm: Arc<FileManager>, blk: BlockId) -> Result<Self> {
        let mut it = Self {
            page: Page::new(fm.block_size()),
            fm,
            blk,
            current_pos: 0,
        };
        it.move_to_block()?;
        Ok(it)
    }

    /// The next record, or `None` once block 0 has been fully consumed.
    pub fn next_record(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.has_next() {
            return Ok(None);
        }
        if self.current_pos == self.fm.block_size() {
            self.blk = BlockId::new(self.blk.filename(), self.blk.number() - 1);
            self.move_to_block()?;
        }
        let rec = self.page.get_bytes(self.current_pos)?.to_vec();
        self.current_pos += INT_SIZE + rec.len();
        Ok(Some(rec))
    }

    fn has_next(&self) -> bool {
        self.current_pos < self.fm.block_size() || self.blk.number() > 0
    }

    fn move_to_block(&mut self) -> Result<()> {
        self.fm.read(&self.blk, &mut self.page)?;
        self.current_pos = self.page.get_int(0)? as usize;
        Ok(())
    }
}
