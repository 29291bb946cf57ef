use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stonedb::concurrency::{ConcurrencyManager, LockTable};
use stonedb::{BlockId, DatabaseConfig, Result, StoneDB, StoneDBError};
use tempfile::TempDir;

fn short_timeouts() -> DatabaseConfig {
    DatabaseConfig {
        lock_timeout: Duration::from_millis(250),
        buffer_timeout: Duration::from_millis(250),
        ..DatabaseConfig::default()
    }
}

#[test]
fn shared_locks_coexist() -> Result<()> {
    let locktbl = Arc::new(LockTable::new(Duration::from_millis(250)));
    let mut cm1 = ConcurrencyManager::new(Arc::clone(&locktbl));
    let mut cm2 = ConcurrencyManager::new(Arc::clone(&locktbl));
    let blk = BlockId::new("testfile", 1);

    cm1.s_lock(&blk)?;
    cm2.s_lock(&blk)?;
    cm1.release();
    cm2.release();
    Ok(())
}

#[test]
fn exclusive_lock_waits_out_other_sharers() -> Result<()> {
    let locktbl = Arc::new(LockTable::new(Duration::from_millis(250)));
    let mut cm1 = ConcurrencyManager::new(Arc::clone(&locktbl));
    let mut cm2 = ConcurrencyManager::new(Arc::clone(&locktbl));
    let blk = BlockId::new("testfile", 1);

    cm1.s_lock(&blk)?;
    let err = cm2.x_lock(&blk).unwrap_err();
    assert!(matches!(err, StoneDBError::LockAbort { .. }));

    // Once the sharer is gone the upgrade goes through.
    cm1.release();
    cm2.release();
    cm2.x_lock(&blk)?;
    cm2.release();
    Ok(())
}

#[test]
fn own_shared_lock_does_not_block_upgrade() -> Result<()> {
    let locktbl = Arc::new(LockTable::new(Duration::from_millis(250)));
    let mut cm = ConcurrencyManager::new(locktbl);
    let blk = BlockId::new("testfile", 1);

    cm.s_lock(&blk)?;
    cm.x_lock(&blk)?;
    // Repeated requests are local no-ops.
    cm.s_lock(&blk)?;
    cm.x_lock(&blk)?;
    cm.release();
    Ok(())
}

#[test]
fn reader_times_out_against_writer() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let db = StoneDB::with_config(&dir.path().join("db"), short_timeouts())?;

    let mut tx1 = db.new_tx()?;
    let blk = tx1.append("testfile")?;
    tx1.pin(&blk)?;
    tx1.set_int(&blk, 0, 1, true)?;

    let mut tx2 = db.new_tx()?;
    tx2.pin(&blk)?;
    let err = tx2.get_int(&blk, 0).unwrap_err();
    assert!(matches!(err, StoneDBError::LockAbort { .. }));

    tx2.rollback()?;
    tx1.rollback()?;
    Ok(())
}

/// Two transactions on separate threads both want an exclusive lock on the
/// same block. The second must observably block until the first commits,
/// and must never read a partially written value.
#[test]
fn writer_blocks_second_writer_until_commit() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        lock_timeout: Duration::from_secs(5),
        ..DatabaseConfig::default()
    };
    let db = Arc::new(StoneDB::with_config(&dir.path().join("db"), config)?);

    let mut tx1 = db.new_tx()?;
    let blk = tx1.append("testfile")?;
    tx1.pin(&blk)?;
    tx1.set_int(&blk, 0, 11, true)?;

    let acquired = Arc::new(AtomicBool::new(false));
    let handle = {
        let db = Arc::clone(&db);
        let blk = blk.clone();
        let acquired = Arc::clone(&acquired);
        thread::spawn(move || -> Result<i32> {
            let mut tx2 = db.new_tx()?;
            tx2.pin(&blk)?;
            tx2.set_int(&blk, 0, 22, true)?;
            acquired.store(true, Ordering::SeqCst);
            let val = tx2.get_int(&blk, 0)?;
            tx2.commit()?;
            Ok(val)
        })
    };

    // The second writer stays blocked while tx1 holds its lock.
    thread::sleep(Duration::from_millis(300));
    assert!(!acquired.load(Ordering::SeqCst));

    tx1.commit()?;
    let val = handle.join().unwrap()?;
    assert!(acquired.load(Ordering::SeqCst));
    assert_eq!(val, 22);

    // tx2's committed write is what a third transaction sees.
    let mut tx3 = db.new_tx()?;
    tx3.pin(&blk)?;
    assert_eq!(tx3.get_int(&blk, 0)?, 22);
    tx3.commit()?;
    Ok(())
}
