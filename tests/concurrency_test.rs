use std::sync::Arc;
use std::thread;

use anyhow::Result;

use stratadb::BlockId;
use stratadb::transaction::TransactionError;

mod common;
use common::test_engine;

#[test]
fn writer_blocks_reader_until_commit() -> Result<()> {
    let (engine, _dir) = test_engine(8, 400)?;
    let blk = BlockId::new("data", 0);

    let mut setup = engine.new_transaction()?;
    setup.pin(&blk)?;
    setup.set_int(&blk, 0, 1)?;
    setup.commit()?;

    let mut writer = engine.new_transaction()?;
    writer.pin(&blk)?;
    writer.set_int(&blk, 0, 2)?;

    let mut reader = engine.new_transaction()?;
    reader.pin(&blk)?;
    match reader.get_int(&blk, 0) {
        Err(TransactionError::Lock(_)) => {}
        other => panic!("expected lock timeout, got {other:?}"),
    }

    writer.commit()?;
    assert_eq!(reader.get_int(&blk, 0)?, 2);
    reader.commit()?;
    Ok(())
}

#[test]
fn readers_share_and_block_upgrades() -> Result<()> {
    let (engine, _dir) = test_engine(8, 400)?;
    let blk = BlockId::new("data", 0);

    let mut setup = engine.new_transaction()?;
    setup.pin(&blk)?;
    setup.set_int(&blk, 0, 7)?;
    setup.commit()?;

    let mut r1 = engine.new_transaction()?;
    let mut r2 = engine.new_transaction()?;
    r1.pin(&blk)?;
    r2.pin(&blk)?;
    assert_eq!(r1.get_int(&blk, 0)?, 7);
    assert_eq!(r2.get_int(&blk, 0)?, 7);

    // r1 cannot upgrade to exclusive while r2 holds its shared lock.
    assert!(matches!(
        r1.set_int(&blk, 0, 8),
        Err(TransactionError::Lock(_))
    ));

    r2.commit()?;
    r1.set_int(&blk, 0, 8)?;
    r1.commit()?;
    Ok(())
}

#[test]
fn conflicting_writers_serialize_across_threads() -> Result<()> {
    let (engine, _dir) = test_engine(8, 400)?;
    let engine = Arc::new(engine);
    let blk = BlockId::new("data", 0);

    let mut handles = Vec::new();
    for tid in 0..3i64 {
        let engine = Arc::clone(&engine);
        let blk = blk.clone();
        handles.push(thread::spawn(move || -> Result<()> {
            // Lock conflicts surface as timeouts; retry until the write
            // lands. The bound keeps a livelock from hanging the test.
            for _ in 0..50 {
                let mut tx = engine.new_transaction()?;
                tx.pin(&blk)?;
                match tx.set_int(&blk, (tid as usize) * 8, tid + 1) {
                    Ok(()) => {
                        tx.commit()?;
                        return Ok(());
                    }
                    Err(TransactionError::Lock(_)) => tx.rollback()?,
                    Err(e) => return Err(e.into()),
                }
            }
            anyhow::bail!("writer {tid} starved out")
        }));
    }
    for h in handles {
        h.join().unwrap()?;
    }

    let mut check = engine.new_transaction()?;
    check.pin(&blk)?;
    for tid in 0..3i64 {
        assert_eq!(check.get_int(&blk, (tid as usize) * 8)?, tid + 1);
    }
    check.commit()?;
    Ok(())
}
