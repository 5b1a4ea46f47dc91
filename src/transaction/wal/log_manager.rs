use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::{BlockId, Lsn};
use crate::storage::file::{FileManager, FileManagerError};
use crate::storage::page::{INT_SIZE, Page, PageError};
use crate::transaction::wal::log_iterator::LogIterator;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("file manager error: {0}")]
    File(#[from] FileManagerError),

    #[error("page error: {0}")]
    Page(#[from] PageError),

    #[error("log record of {size} bytes does not fit in a {block_size}-byte block")]
    RecordTooLarge { size: usize, block_size: usize },
}

pub type Result<T> = std::result::Result<T, LogError>;

/// State guarded by the log mutex: the single in-memory log page, the
/// block it maps to, and the LSN watermarks.
struct LogCore {
    page: Page,
    current_blk: BlockId,
    latest_lsn: Lsn,
    last_saved_lsn: Lsn,
}

/// The write-ahead log: an append-only sequence of byte records over the
/// block store, each identified by a strictly increasing LSN.
///
/// Records are packed into the current log block from the end backward;
/// the integer at offset 0 of every log block (the boundary) is the
/// offset of the earliest record in that block. Appending a record that
/// would push the boundary below `INT_SIZE` forces the current block to
/// disk and allocates a fresh one. The backward packing is what lets the
/// iterator yield records in reverse chronological order with a plain
/// forward scan of each block.
pub struct LogManager {
    fm: Arc<FileManager>,
    logfile: String,
    inner: Mutex<LogCore>,
}

impl LogManager {
    /// Open the log, positioning the in-memory page over the last block
    /// of the log file (or a fresh first block if the log is empty).
    pub fn new(fm: Arc<FileManager>, logfile: impl Into<String>) -> Result<Self> {
        let logfile = logfile.into();
        let mut page = Page::new(fm.block_size());
        let logsize = fm.length(&logfile)?;

        let current_blk = if logsize == 0 {
            Self::append_new_block(&fm, &logfile, &mut page)?
        } else {
            let blk = BlockId::new(logfile.clone(), logsize - 1);
            fm.read(&blk, &mut page)?;
            blk
        };

        Ok(Self {
            fm,
            logfile,
            inner: Mutex::new(LogCore {
                page,
                current_blk,
                latest_lsn: 0,
                last_saved_lsn: 0,
            }),
        })
    }

    /// Append a record and return its LSN. The record is only guaranteed
    /// durable once a `flush` covering that LSN returns.
    pub fn append(&self, rec: &[u8]) -> Result<Lsn> {
        let block_size = self.fm.block_size();
        let bytes_needed = rec.len() + INT_SIZE;
        if bytes_needed + INT_SIZE > block_size {
            return Err(LogError::RecordTooLarge {
                size: rec.len(),
                block_size,
            });
        }

        let mut core = self.inner.lock();
        let mut boundary = core.page.get_int(0)?;

        if boundary - (bytes_needed as i64) < INT_SIZE as i64 {
            // Record does not fit; force the current block out and start
            // a new one.
            self.flush_core(&mut core)?;
            core.current_blk = Self::append_new_block(&self.fm, &self.logfile, &mut core.page)?;
            boundary = core.page.get_int(0)?;
        }

        let recpos = (boundary - bytes_needed as i64) as usize;
        core.page.set_bytes(recpos, rec)?;
        core.page.set_int(0, recpos as i64)?;
        core.latest_lsn += 1;
        Ok(core.latest_lsn)
    }

    /// Ensure every record with LSN <= `lsn` is on stable storage.
    pub fn flush(&self, lsn: Lsn) -> Result<()> {
        let mut core = self.inner.lock();
        if lsn >= core.last_saved_lsn {
            self.flush_core(&mut core)?;
        }
        Ok(())
    }

    /// Iterate durable records in reverse chronological order (most
    /// recent first). Forces the in-memory page first so the iterator
    /// sees everything appended so far.
    pub fn iterator(&self) -> Result<LogIterator> {
        let mut core = self.inner.lock();
        self.flush_core(&mut core)?;
        LogIterator::new(Arc::clone(&self.fm), core.current_blk.clone())
    }

    fn flush_core(&self, core: &mut LogCore) -> Result<()> {
        self.fm.write(&core.current_blk, &core.page)?;
        core.last_saved_lsn = core.latest_lsn;
        Ok(())
    }

    fn append_new_block(fm: &FileManager, logfile: &str, page: &mut Page) -> Result<BlockId> {
        let blk = fm.append(logfile)?;
        debug!("log extended to {}", blk);
        *page = Page::new(fm.block_size());
        page.set_int(0, fm.block_size() as i64)?;
        fm.write(&blk, page)?;
        Ok(blk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_log_manager(block_size: usize) -> (LogManager, TempDir) {
        let dir = TempDir::new().unwrap();
        let fm = Arc::new(FileManager::new(dir.path().join("db"), block_size).unwrap());
        let lm = LogManager::new(fm, "logfile").unwrap();
        (lm, dir)
    }

    #[test]
    fn lsns_increase_by_one_from_one() {
        let (lm, _dir) = test_log_manager(400);
        for expected in 1..=20u64 {
            let lsn = lm.append(format!("record{expected}").as_bytes()).unwrap();
            assert_eq!(lsn, expected);
        }
    }

    #[test]
    fn oversized_record_is_rejected() {
        let (lm, _dir) = test_log_manager(64);
        let too_big = vec![0u8; 64];
        assert!(matches!(
            lm.append(&too_big),
            Err(LogError::RecordTooLarge { .. })
        ));
    }

    #[test]
    fn iterator_yields_newest_first_across_blocks() {
        let (lm, _dir) = test_log_manager(96);
        // Small block forces several spills to new log blocks.
        for i in 0..12 {
            lm.append(format!("rec-{i:02}").as_bytes()).unwrap();
        }

        let mut it = lm.iterator().unwrap();
        let mut seen = Vec::new();
        while let Some(rec) = it.next_record().unwrap() {
            seen.push(String::from_utf8(rec).unwrap());
        }
        let expected: Vec<String> = (0..12).rev().map(|i| format!("rec-{i:02}")).collect();
        assert_eq!(seen, expected);
    }
}
