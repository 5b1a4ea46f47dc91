// stratadb shared types
//
// Identifiers and configuration shared by every storage layer.

use std::fmt;
use std::time::Duration;

/// Log sequence number. Assigned by the log manager, strictly increasing,
/// starting at 1. Never reused within one log's lifetime.
pub type Lsn = u64;

/// Transaction number. Allocated from a process-wide atomic counter owned
/// by the storage engine; never reused.
pub type TxnId = i64;

/// Block number within a file. Signed so that -1 can serve as the
/// end-of-file sentinel used for file-size locking.
pub type BlockNum = i64;

/// Block number used to lock the end of a file against concurrent growth.
pub const END_OF_FILE: BlockNum = -1;

/// Reference to a specific block of a specific file.
///
/// Identity is structural: two `BlockId`s naming the same (file, number)
/// pair compare equal and hash identically, so they can be used directly
/// as map keys in the buffer pool and lock table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    filename: String,
    blknum: BlockNum,
}

impl BlockId {
    pub fn new(filename: impl Into<String>, blknum: BlockNum) -> Self {
        Self {
            filename: filename.into(),
            blknum,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn number(&self) -> BlockNum {
        self.blknum
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, block {}]", self.filename, self.blknum)
    }
}

/// Wait behavior for operations that block on a shared resource (buffer
/// pin, block lock). Injected rather than hard-coded so tests can use
/// short timeouts.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Upper bound on a single condvar wait before the predicate is
    /// re-checked.
    pub poll_interval: Duration,
    /// Total time to wait before the acquisition fails.
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            timeout: Duration::from_secs(2),
        }
    }
}
