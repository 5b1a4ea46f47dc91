use std::sync::Arc;

use crate::common::{BlockId, Lsn, TxnId};
use crate::storage::buffer::error::Result;
use crate::storage::file::FileManager;
use crate::storage::page::Page;
use crate::transaction::wal::log_manager::LogManager;

/// One frame of the buffer pool: a page, the block currently resident in
/// it, and the pin/dirty bookkeeping.
///
/// Frames are allocated once at pool construction and reused for the life
/// of the engine. A frame is dirty when `txn` is set; `lsn` is the most
/// recent log record covering the modification, and the frame's contents
/// may not reach disk before the log is flushed through that LSN.
pub struct Buffer {
    fm: Arc<FileManager>,
    lm: Arc<LogManager>,
    contents: Page,
    blk: Option<BlockId>,
    pins: u32,
    txn: Option<TxnId>,
    lsn: Option<Lsn>,
}

impl Buffer {
    pub(crate) fn new(fm: Arc<FileManager>, lm: Arc<LogManager>) -> Self {
        let contents = Page::new(fm.block_size());
        Self {
            fm,
            lm,
            contents,
            blk: None,
            pins: 0,
            txn: None,
            lsn: None,
        }
    }

    pub fn contents(&self) -> &Page {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut Page {
        &mut self.contents
    }

    pub fn block(&self) -> Option<&BlockId> {
        self.blk.as_ref()
    }

    /// Record that `txn` modified this frame's page. `lsn` is the log
    /// record covering the change, or `None` for replay writes that are
    /// intentionally unlogged (undo/redo).
    pub fn set_modified(&mut self, txn: TxnId, lsn: Option<Lsn>) {
        self.txn = Some(txn);
        if let Some(lsn) = lsn {
            self.lsn = Some(lsn);
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub fn modifying_txn(&self) -> Option<TxnId> {
        self.txn
    }

    pub fn lsn(&self) -> Option<Lsn> {
        self.lsn
    }

    pub(crate) fn pin(&mut self) {
        self.pins += 1;
    }

    pub(crate) fn unpin(&mut self) {
        debug_assert!(self.pins > 0, "unpin of an unpinned frame");
        self.pins = self.pins.saturating_sub(1);
    }

    /// Repurpose this frame for a different block: flush any dirty
    /// contents, then read the new block in. Only called on unpinned
    /// frames, under the pool mutex.
    pub(crate) fn assign_to_block(&mut self, blk: BlockId) -> Result<()> {
        self.flush()?;
        self.fm.read(&blk, &mut self.contents)?;
        self.blk = Some(blk);
        self.pins = 0;
        Ok(())
    }

    /// Write the page back if dirty. The log is forced through the
    /// frame's covering LSN first (write-ahead).
    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.txn.is_none() {
            return Ok(());
        }
        if let Some(lsn) = self.lsn {
            self.lm.flush(lsn)?;
        }
        if let Some(blk) = &self.blk {
            self.fm.write(blk, &self.contents)?;
        }
        self.txn = None;
        self.lsn = None;
        Ok(())
    }
}
