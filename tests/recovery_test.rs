use anyhow::Result;

use stratadb::transaction::LogRecord;
use stratadb::{BlockId, Page};

mod common;
use common::{reopen_engine, test_engine};

#[test]
fn committed_update_survives_a_crash() -> Result<()> {
    let (engine, dir) = test_engine(8, 400)?;
    let blk = BlockId::new("data", 0);

    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 80, 42)?;
    tx.set_string(&blk, 120, "keep")?;
    tx.commit()?;
    drop(engine); // crash: no orderly shutdown

    let engine = reopen_engine(&dir, 8, 400)?;
    engine.recover()?;

    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 80)?, 42);
    assert_eq!(tx.get_string(&blk, 120)?, "keep");
    tx.commit()?;
    Ok(())
}

#[test]
fn uncommitted_update_is_undone_after_a_crash() -> Result<()> {
    let (engine, dir) = test_engine(8, 400)?;
    let blk = BlockId::new("data", 0);

    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 80, 1)?;
    tx.set_string(&blk, 120, "old")?;
    tx.commit()?;

    // A second transaction overwrites both fields and its dirty page is
    // stolen to disk, but it never commits.
    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 80, 2)?;
    tx.set_string(&blk, 120, "new")?;
    let txnum = tx.id();
    engine.buffer_manager().flush_all(txnum)?;
    drop(tx);
    drop(engine);

    let engine = reopen_engine(&dir, 8, 400)?;

    // The stolen page really did reach disk.
    let mut page = Page::new(400);
    engine.file_manager().read(&blk, &mut page)?;
    assert_eq!(page.get_int(80)?, 2);

    engine.recover()?;

    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 80)?, 1);
    assert_eq!(tx.get_string(&blk, 120)?, "old");
    tx.commit()?;
    Ok(())
}

#[test]
fn redo_reapplies_committed_updates_lost_from_disk() -> Result<()> {
    let (engine, dir) = test_engine(8, 400)?;
    let blk = BlockId::new("data", 0);

    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 80, 7)?;
    tx.set_string(&blk, 120, "redone")?;
    tx.commit()?;
    drop(engine);

    let engine = reopen_engine(&dir, 8, 400)?;
    // Clobber the data page on disk; only the log still has the values.
    let page = Page::new(400);
    engine.file_manager().write(&blk, &page)?;
    engine.recover()?;

    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 80)?, 7);
    assert_eq!(tx.get_string(&blk, 120)?, "redone");
    tx.commit()?;
    Ok(())
}

#[test]
fn rolled_back_values_stay_rolled_back_after_a_crash() -> Result<()> {
    let (engine, dir) = test_engine(8, 400)?;
    let blk = BlockId::new("data", 0);

    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 80, 1)?;
    tx.commit()?;

    // A clean rollback before the crash. Recovery must not redo the
    // aborted write over the restored before-image.
    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 80, 42)?;
    tx.rollback()?;
    drop(engine);

    let engine = reopen_engine(&dir, 8, 400)?;
    engine.recover()?;

    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 80)?, 1);
    tx.commit()?;
    Ok(())
}

#[test]
fn recovery_separates_finished_from_unfinished_transactions() -> Result<()> {
    let (engine, dir) = test_engine(8, 400)?;
    let committed_blk = BlockId::new("data", 0);
    let aborted_blk = BlockId::new("data", 1);

    let mut tx = engine.new_transaction()?;
    tx.pin(&committed_blk)?;
    tx.pin(&aborted_blk)?;
    tx.set_int(&committed_blk, 0, 10)?;
    tx.set_int(&aborted_blk, 0, 20)?;
    tx.commit()?;

    let mut committer = engine.new_transaction()?;
    committer.pin(&committed_blk)?;
    committer.set_int(&committed_blk, 0, 11)?;

    let mut loser = engine.new_transaction()?;
    loser.pin(&aborted_blk)?;
    loser.set_int(&aborted_blk, 0, 21)?;
    let loser_txnum = loser.id();

    committer.commit()?;
    engine.buffer_manager().flush_all(loser_txnum)?;
    drop(loser);
    drop(engine);

    let engine = reopen_engine(&dir, 8, 400)?;
    engine.recover()?;

    let mut tx = engine.new_transaction()?;
    tx.pin(&committed_blk)?;
    tx.pin(&aborted_blk)?;
    assert_eq!(tx.get_int(&committed_blk, 0)?, 11);
    assert_eq!(tx.get_int(&aborted_blk, 0)?, 20);
    tx.commit()?;
    Ok(())
}

#[test]
fn recovery_ends_with_a_checkpoint_and_is_idempotent() -> Result<()> {
    let (engine, dir) = test_engine(8, 400)?;
    let blk = BlockId::new("data", 0);

    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 0, 33)?;
    tx.commit()?;
    drop(engine);

    let engine = reopen_engine(&dir, 8, 400)?;
    engine.recover()?;

    let mut it = engine.log_manager().iterator()?;
    let newest = it.next_record()?.expect("log has records after recovery");
    assert!(matches!(LogRecord::decode(&newest)?, LogRecord::Checkpoint));

    // A second pass stops at the fresh checkpoint and changes nothing.
    engine.recover()?;
    let mut tx = engine.new_transaction()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 0)?, 33);
    tx.commit()?;
    Ok(())
}
