use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::warn;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::{BlockId, BlockNum};
use crate::storage::page::Page;

#[derive(Error, Debug)]
pub enum FileManagerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("block number {0} is not addressable")]
    InvalidBlock(BlockNum),
}

pub type Result<T> = std::result::Result<T, FileManagerError>;

/// The block store: whole-block I/O over the files of one database
/// directory, at a fixed block size.
///
/// One `FileManager` exists per engine. File handles are opened lazily
/// and cached; all I/O goes through one manager-wide mutex, so block
/// reads and writes are serialized.
pub struct FileManager {
    db_dir: PathBuf,
    block_size: usize,
    open_files: Mutex<HashMap<String, File>>,
    is_new: bool,
}

impl FileManager {
    /// Open (or create) the database directory. Leftover temporary files
    /// from a previous run are removed.
    pub fn new(db_dir: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        let db_dir = db_dir.as_ref().to_path_buf();
        let is_new = !db_dir.exists();
        if is_new {
            fs::create_dir_all(&db_dir)?;
        }

        for entry in fs::read_dir(&db_dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().contains("temp") {
                if let Err(e) = fs::remove_file(entry.path()) {
                    warn!("could not remove temp file {:?}: {}", entry.path(), e);
                }
            }
        }

        Ok(Self {
            db_dir,
            block_size,
            open_files: Mutex::new(HashMap::new()),
            is_new,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether the database directory was created by this startup. A fresh
    /// database has no log to recover from.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Read the contents of `blk` into `page`. A block past the current
    /// end of file reads as zeroes, matching what `append` would have
    /// written there.
    pub fn read(&self, blk: &BlockId, page: &mut Page) -> Result<()> {
        let offset = self.block_offset(blk)?;
        let mut files = self.open_files.lock();
        let file = Self::file_for(&self.db_dir, &mut files, blk.filename())?;

        let file_size = file.metadata()?.len();
        if offset >= file_size {
            page.as_mut_slice().fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    /// Write the contents of `page` to `blk` and sync to stable storage.
    pub fn write(&self, blk: &BlockId, page: &Page) -> Result<()> {
        let offset = self.block_offset(blk)?;
        let mut files = self.open_files.lock();
        let file = Self::file_for(&self.db_dir, &mut files, blk.filename())?;

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.as_slice())?;
        file.sync_all()?;
        Ok(())
    }

    /// Grow `filename` by one zero-filled block and return its id.
    pub fn append(&self, filename: &str) -> Result<BlockId> {
        let mut files = self.open_files.lock();
        let file = Self::file_for(&self.db_dir, &mut files, filename)?;

        let blknum = (file.metadata()?.len() / self.block_size as u64) as BlockNum;
        let blk = BlockId::new(filename, blknum);

        file.seek(SeekFrom::Start(blknum as u64 * self.block_size as u64))?;
        file.write_all(&vec![0; self.block_size])?;
        file.sync_all()?;
        Ok(blk)
    }

    /// Number of blocks currently in `filename`.
    pub fn length(&self, filename: &str) -> Result<BlockNum> {
        let mut files = self.open_files.lock();
        let file = Self::file_for(&self.db_dir, &mut files, filename)?;
        Ok((file.metadata()?.len() / self.block_size as u64) as BlockNum)
    }

    fn block_offset(&self, blk: &BlockId) -> Result<u64> {
        if blk.number() < 0 {
            return Err(FileManagerError::InvalidBlock(blk.number()));
        }
        Ok(blk.number() as u64 * self.block_size as u64)
    }

    fn file_for<'a>(
        db_dir: &Path,
        files: &'a mut HashMap<String, File>,
        filename: &str,
    ) -> Result<&'a mut File> {
        match files.entry(filename.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(db_dir.join(filename))?;
                Ok(entry.insert(file))
            }
        }
    }
}
