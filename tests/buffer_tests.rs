use std::sync::Arc;
use std::time::Duration;

use stonedb::{
    BlockId, BufferManager, DatabaseConfig, FileManager, LogManager, Result, StoneDB, StoneDBError,
    TxId,
};
use tempfile::TempDir;

fn small_config() -> DatabaseConfig {
    DatabaseConfig {
        buffer_pool_size: 3,
        buffer_timeout: Duration::from_millis(250),
        lock_timeout: Duration::from_millis(250),
        ..DatabaseConfig::default()
    }
}

fn make_pool(dir: &TempDir) -> Result<(Arc<FileManager>, BufferManager)> {
    let config = small_config();
    let fm = Arc::new(FileManager::new(dir.path().join("db"), config.block_size)?);
    let lm = Arc::new(LogManager::new(Arc::clone(&fm), config.log_file)?);
    let bm = BufferManager::new(
        Arc::clone(&fm),
        lm,
        config.buffer_pool_size,
        config.buffer_timeout,
    );
    Ok((fm, bm))
}

#[test]
fn pin_reuses_frame_bound_to_same_block() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let (fm, bm) = make_pool(&dir)?;
    let blk = fm.append("testfile")?;

    let b1 = bm.pin(&blk)?;
    let b2 = bm.pin(&blk)?;
    assert!(Arc::ptr_eq(&b1, &b2));
    assert_eq!(bm.available(), 2);

    bm.unpin(&b1)?;
    assert_eq!(bm.available(), 2);
    bm.unpin(&b2)?;
    assert_eq!(bm.available(), 3);
    Ok(())
}

#[test]
fn eviction_preserves_modified_contents() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let (fm, bm) = make_pool(&dir)?;
    for _ in 0..4 {
        fm.append("testfile")?;
    }

    let blk0 = BlockId::new("testfile", 0);
    let buff = bm.pin(&blk0)?;
    {
        let mut b = buff.lock();
        b.contents_mut().set_int(24, 99);
        b.set_modified(TxId(1), None);
    }
    bm.unpin(&buff)?;

    // Fill the pool with other blocks so frame 0 gets evicted and flushed.
    let pinned: Vec<_> = (1..4)
        .map(|i| bm.pin(&BlockId::new("testfile", i)))
        .collect::<Result<_>>()?;
    for buff in &pinned {
        bm.unpin(buff)?;
    }

    let buff = bm.pin(&blk0)?;
    assert_eq!(buff.lock().contents().get_int(24), 99);
    bm.unpin(&buff)?;
    Ok(())
}

#[test]
fn pin_times_out_when_pool_is_exhausted() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let (fm, bm) = make_pool(&dir)?;
    for _ in 0..4 {
        fm.append("testfile")?;
    }

    let held: Vec<_> = (0..3)
        .map(|i| bm.pin(&BlockId::new("testfile", i)))
        .collect::<Result<_>>()?;
    assert_eq!(bm.available(), 0);

    let err = bm.pin(&BlockId::new("testfile", 3)).unwrap_err();
    assert!(matches!(err, StoneDBError::BufferAbort(_)));

    // Freeing one frame makes the pin succeed again.
    bm.unpin(&held[0])?;
    let buff = bm.pin(&BlockId::new("testfile", 3))?;
    bm.unpin(&buff)?;
    Ok(())
}

#[test]
fn unpinning_below_zero_is_an_error() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let (fm, bm) = make_pool(&dir)?;
    let blk = fm.append("testfile")?;

    let buff = bm.pin(&blk)?;
    bm.unpin(&buff)?;
    assert!(bm.unpin(&buff).is_err());
    Ok(())
}

#[test]
fn transaction_pin_exhaustion_surfaces_buffer_abort() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let db = StoneDB::with_config(&dir.path().join("db"), small_config())?;

    let mut tx = db.new_tx()?;
    for _ in 0..4 {
        tx.append("testfile")?;
    }
    for i in 0..3 {
        tx.pin(&BlockId::new("testfile", i))?;
    }
    let err = tx.pin(&BlockId::new("testfile", 3)).unwrap_err();
    assert!(matches!(err, StoneDBError::BufferAbort(_)));
    tx.rollback()?;
    Ok(())
}
