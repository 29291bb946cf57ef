pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod log_mod;
pub mod recovery;
pub mod storage;
pub mod transaction;

pub use buffer::BufferManager;
pub use common::{DatabaseConfig, Lsn, Result, StoneDBError, TxId};
pub use concurrency::LockTable;
pub use log_mod::LogManager;
pub use storage::{BlockId, FileManager, Page};
pub use transaction::Transaction;

use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use log::info;

/// The transactional storage kernel: wires the disk, log, buffer, and lock
/// components together and hands out transactions. Everything above the
/// kernel (parsing, planning, record layout) consumes it only through
/// `new_tx` and the Transaction API.
pub struct StoneDB {
    fm: Arc<FileManager>,
    lm: Arc<LogManager>,
    bm: Arc<BufferManager>,
    locktbl: Arc<LockTable>,
    next_txnum: AtomicI32,
}

impl StoneDB {
    /// Build the kernel without running recovery. Useful for tests and
    /// tools that drive the components directly.
    pub fn with_config(db_directory: &Path, config: DatabaseConfig) -> Result<Self> {
        let fm = Arc::new(FileManager::new(db_directory, config.block_size)?);
        let lm = Arc::new(LogManager::new(Arc::clone(&fm), config.log_file)?);
        let bm = Arc::new(BufferManager::new(
            Arc::clone(&fm),
            Arc::clone(&lm),
            config.buffer_pool_size,
            config.buffer_timeout,
        ));
        let locktbl = Arc::new(LockTable::new(config.lock_timeout));
        Ok(Self {
            fm,
            lm,
            bm,
            locktbl,
            next_txnum: AtomicI32::new(1),
        })
    }

    /// Open a database with default configuration, honoring the startup
    /// contract: a fresh directory needs no recovery, an existing one is
    /// recovered exactly once before any other transaction runs.
    pub fn open(db_directory: &Path) -> Result<Self> {
        let db = Self::with_config(db_directory, DatabaseConfig::default())?;
        if db.fm.is_new() {
            info!("creating new database");
        } else {
            info!("recovering existing database");
            let mut tx = db.new_tx()?;
            tx.recover()?;
            tx.commit()?;
        }
        Ok(db)
    }

    pub fn new_tx(&self) -> Result<Transaction> {
        let txnum = TxId(self.next_txnum.fetch_add(1, Ordering::SeqCst));
        Transaction::new(
            Arc::clone(&self.fm),
            Arc::clone(&self.lm),
            Arc::clone(&self.bm),
            Arc::clone(&self.locktbl),
            txnum,
        )
    }

    // Component accessors, mainly for tests and debugging tools.

    pub fn file_mgr(&self) -> &Arc<FileManager> {
        &self.fm
    }

    pub fn log_mgr(&self) -> &Arc<LogManager> {
        &self.lm
    }

    pub fn buffer_mgr(&self) -> &Arc<BufferManager> {
        &self.bm
    }

    pub fn lock_table(&self) -> &Arc<LockTable> {
        &self.locktbl
    }
}
