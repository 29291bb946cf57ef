use std::sync::Arc;

use log::info;

use parking_lot::Mutex;

use crate::buffer::{Buffer, BufferManager};
use crate::common::{Result, StoneDBError, TxId};
use crate::concurrency::{ConcurrencyManager, LockTable};
use crate::log_mod::LogManager;
use crate::recovery::RecoveryManager;
use crate::storage::{BlockId, FileManager};
use crate::transaction::BufferList;

/// Synthetic block number standing for the end of a file. Appends take an
/// exclusive lock on it, size reads a shared one, which serializes
/// concurrent appends against length reads.
pub const END_OF_FILE: i32 = -1;

/// Coordinator for one unit of work. Reads and writes go through strict
/// two-phase locking and undo logging; `commit` and `rollback` are the
/// terminal actions and release all locks and pins.
///
/// Timeout aborts (LockAbort, BufferAbort) propagate out of the accessors;
/// the owner of the transaction is expected to respond by rolling back.
pub struct Transaction {
    fm: Arc<FileManager>,
    bm: Arc<BufferManager>,
    txnum: TxId,
    recovery_mgr: RecoveryManager,
    concur_mgr: ConcurrencyManager,
    my_buffers: BufferList,
}

impl Transaction {
    pub fn new(
        fm: Arc<FileManager>,
        lm: Arc<LogManager>,
        bm: Arc<BufferManager>,
        locktbl: Arc<LockTable>,
        txnum: TxId,
    ) -> Result<Self> {
        let recovery_mgr = RecoveryManager::new(txnum, lm, Arc::clone(&bm))?;
        let concur_mgr = ConcurrencyManager::new(locktbl);
        let my_buffers = BufferList::new(Arc::clone(&bm));
        Ok(Self {
            fm,
            bm,
            txnum,
            recovery_mgr,
            concur_mgr,
            my_buffers,
        })
    }

    pub fn tx_number(&self) -> TxId {
        self.txnum
    }

    pub fn commit(mut self) -> Result<()> {
        self.recovery_mgr.commit()?;
        info!("transaction {} committed", self.txnum);
        self.concur_mgr.release();
        self.my_buffers.unpin_all()
    }

    pub fn rollback(mut self) -> Result<()> {
        let recovery_mgr = self.recovery_mgr.clone();
        recovery_mgr.rollback(&mut self)?;
        info!("transaction {} rolled back", self.txnum);
        self.concur_mgr.release();
        self.my_buffers.unpin_all()
    }

    /// Undo every transaction that was in flight when the process last
    /// stopped. The owning process calls this exactly once at startup,
    /// before any other transaction does normal work; this transaction
    /// stays usable and should be committed afterwards.
    pub fn recover(&mut self) -> Result<()> {
        self.bm.flush_all(self.txnum)?;
        let recovery_mgr = self.recovery_mgr.clone();
        recovery_mgr.recover(self)
    }

    pub fn pin(&mut self, blk: &BlockId) -> Result<()> {
        self.my_buffers.pin(blk)
    }

    pub fn unpin(&mut self, blk: &BlockId) -> Result<()> {
        self.my_buffers.unpin(blk)
    }

    pub fn get_int(&mut self, blk: &BlockId, offset: usize) -> Result<i32> {
        self.concur_mgr.s_lock(blk)?;
        let buff = self.buffer_for(blk)?;
        let guard = buff.lock();
        Ok(guard.contents().get_int(offset))
    }

    pub fn get_string(&mut self, blk: &BlockId, offset: usize) -> Result<String> {
        self.concur_mgr.s_lock(blk)?;
        let buff = self.buffer_for(blk)?;
        let guard = buff.lock();
        Ok(guard.contents().get_string(offset))
    }

    /// Write an int at the offset. When `ok_to_log` is set, the undo record
    /// holding the old value is appended strictly before the page is
    /// mutated; undo application itself passes false to avoid re-logging.
    pub fn set_int(&mut self, blk: &BlockId, offset: usize, val: i32, ok_to_log: bool) -> Result<()> {
        self.concur_mgr.x_lock(blk)?;
        let buff = self.buffer_for(blk)?;
        let mut guard = buff.lock();
        let lsn = if ok_to_log {
            Some(self.recovery_mgr.set_int(&guard, offset)?)
        } else {
            None
        };
        guard.contents_mut().set_int(offset, val);
        guard.set_modified(self.txnum, lsn);
        Ok(())
    }

    pub fn set_string(
        &mut self,
        blk: &BlockId,
        offset: usize,
        val: &str,
        ok_to_log: bool,
    ) -> Result<()> {
        self.concur_mgr.x_lock(blk)?;
        let buff = self.buffer_for(blk)?;
        let mut guard = buff.lock();
        let lsn = if ok_to_log {
            Some(self.recovery_mgr.set_string(&guard, offset)?)
        } else {
            None
        };
        guard.contents_mut().set_string(offset, val);
        guard.set_modified(self.txnum, lsn);
        Ok(())
    }

    /// Number of blocks in the file. Takes a shared lock on the end-of-file
    /// sentinel so the length cannot race an uncommitted append.
    pub fn size(&mut self, filename: &str) -> Result<i32> {
        let dummyblk = BlockId::new(filename, END_OF_FILE);
        self.concur_mgr.s_lock(&dummyblk)?;
        self.fm.length(filename)
    }

    /// Append a new block to the file. Exclusive lock on the end-of-file
    /// sentinel serializes concurrent appends to the same file.
    pub fn append(&mut self, filename: &str) -> Result<BlockId> {
        let dummyblk = BlockId::new(filename, END_OF_FILE);
        self.concur_mgr.x_lock(&dummyblk)?;
        self.fm.append(filename)
    }

    pub fn block_size(&self) -> usize {
        self.fm.block_size()
    }

    fn buffer_for(&self, blk: &BlockId) -> Result<Arc<Mutex<Buffer>>> {
        self.my_buffers
            .get_buffer(blk)
            .ok_or_else(|| StoneDBError::BlockNotPinned(blk.clone()))
    }
}
