use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use stratadb::common::WaitConfig;
use stratadb::{StorageConfig, StorageEngine};

// Waits short enough that pool-exhaustion and lock-conflict tests fail
// in milliseconds instead of the production default of seconds.
pub fn test_config(pool_size: usize, block_size: usize) -> StorageConfig {
    StorageConfig {
        block_size,
        pool_size,
        log_file: "logfile".to_string(),
        wait: WaitConfig {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(150),
        },
    }
}

// Create an engine over a fresh temporary database directory.
pub fn test_engine(pool_size: usize, block_size: usize) -> Result<(StorageEngine, TempDir)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new()?;
    let engine = StorageEngine::new(dir.path().join("db"), test_config(pool_size, block_size))?;
    Ok((engine, dir))
}

// Reopen the same database directory, as after a process restart.
#[allow(dead_code)]
pub fn reopen_engine(dir: &TempDir, pool_size: usize, block_size: usize) -> Result<StorageEngine> {
    Ok(StorageEngine::new(
        dir.path().join("db"),
        test_config(pool_size, block_size),
    )?)
}
