use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace};
use parking_lot::{Condvar, Mutex};

use crate::common::{Lsn, Result, StoneDBError, TxId};
use crate::log_mod::LogManager;
use crate::storage::{BlockId, FileManager, Page};

/// A frame in the buffer pool: one page, bound to at most one block, with a
/// pin count and dirty-transaction/LSN metadata.
#[derive(Debug)]
pub struct Buffer {
    fm: Arc<FileManager>,
    lm: Arc<LogManager>,
    contents: Page,
    blk: Option<BlockId>,
    pins: u32,
    txnum: Option<TxId>,
    lsn: Option<Lsn>,
}

impl Buffer {
    fn new(fm: Arc<FileManager>, lm: Arc<LogManager>) -> Self {
        let contents = Page::new(fm.block_size());
        Self {
            fm,
            lm,
            contents,
            blk: None,
            pins: 0,
            txnum: None,
            lsn: None,
        }
    }

    pub fn contents(&self) -> &Page {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut Page {
        &mut self.contents
    }

    /// The block this frame currently holds, if any.
    pub fn block(&self) -> Option<&BlockId> {
        self.blk.as_ref()
    }

    /// Mark the buffer dirty. `lsn` is the LSN of the record governing the
    /// change; unlogged changes pass None and leave the watermark alone.
    pub fn set_modified(&mut self, txnum: TxId, lsn: Option<Lsn>) {
        self.txnum = Some(txnum);
        if lsn.is_some() {
            self.lsn = lsn;
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub fn modifying_tx(&self) -> Option<TxId> {
        self.txnum
    }

    fn assign_to_block(&mut self, blk: BlockId) -> Result<()> {
        self.flush()?;
        self.fm.read(&blk, &mut self.contents)?;
        self.blk = Some(blk);
        self.pins = 0;
        Ok(())
    }

    /// Write the buffer back to its block if it is dirty. The governing log
    /// record is made durable first (WAL flush-ahead rule).
    fn flush(&mut self) -> Result<()> {
        if self.txnum.is_none() {
            return Ok(());
        }
        if let Some(lsn) = self.lsn {
            self.lm.flush_lsn(lsn)?;
        }
        if let Some(blk) = &self.blk {
            trace!("flushing dirty buffer for {}", blk);
            self.fm.write(blk, &self.contents)?;
        }
        self.txnum = None;
        Ok(())
    }

    fn pin(&mut self) {
        self.pins += 1;
    }

    fn unpin(&mut self) -> Result<()> {
        if self.pins == 0 {
            return Err(StoneDBError::Other(
                "cannot unpin a buffer with pin count 0".to_string(),
            ));
        }
        self.pins -= 1;
        Ok(())
    }
}

struct PoolState {
    pool: Vec<Arc<Mutex<Buffer>>>,
    num_available: usize,
}

/// A fixed set of frames allocated once at construction and reassigned
/// across blocks for the pool's lifetime. Pinning blocks the caller for up
/// to `max_time` when every frame is pinned. Replacement is any-fit, not
/// LRU: the contract is pin/unpin, so the policy can be swapped later.
pub struct BufferManager {
    state: Mutex<PoolState>,
    cond: Condvar,
    max_time: Duration,
}

impl BufferManager {
    pub fn new(
        fm: Arc<FileManager>,
        lm: Arc<LogManager>,
        numbuffs: usize,
        max_time: Duration,
    ) -> Self {
        let pool = (0..numbuffs)
            .map(|_| Arc::new(Mutex::new(Buffer::new(Arc::clone(&fm), Arc::clone(&lm)))))
            .collect();
        Self {
            state: Mutex::new(PoolState {
                pool,
                num_available: numbuffs,
            }),
            cond: Condvar::new(),
            max_time,
        }
    }

    /// Number of unpinned frames.
    pub fn available(&self) -> usize {
        self.state.lock().num_available
    }

    /// Pin the block into a frame, waiting up to the pool's bound for one
    /// to free up. Expiry yields BufferAbort: the caller should roll back
    /// the whole transaction and retry.
    pub fn pin(&self, blk: &BlockId) -> Result<Arc<Mutex<Buffer>>> {
        let deadline = Instant::now() + self.max_time;
        let mut state = self.state.lock();
        loop {
            if let Some(buff) = Self::try_to_pin(&mut state, blk)? {
                return Ok(buff);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("pin of {} timed out", blk);
                return Err(StoneDBError::BufferAbort(self.max_time));
            }
            self.cond.wait_for(&mut state, deadline - now);
        }
    }

    /// Drop one pin. The last unpin makes the frame available and wakes
    /// every waiter to re-check.
    pub fn unpin(&self, buff: &Arc<Mutex<Buffer>>) -> Result<()> {
        let mut state = self.state.lock();
        let mut b = buff.lock();
        b.unpin()?;
        if !b.is_pinned() {
            state.num_available += 1;
            self.cond.notify_all();
        }
        Ok(())
    }

    /// Flush every buffer modified by the given transaction. Called at
    /// commit to implement the FORCE policy.
    pub fn flush_all(&self, txnum: TxId) -> Result<()> {
        let state = self.state.lock();
        for buff in &state.pool {
            let mut b = buff.lock();
            if b.modifying_tx() == Some(txnum) {
                b.flush()?;
            }
        }
        Ok(())
    }

    fn try_to_pin(state: &mut PoolState, blk: &BlockId) -> Result<Option<Arc<Mutex<Buffer>>>> {
        let buff = match Self::find_existing_buffer(state, blk) {
            Some(buff) => buff,
            None => match Self::choose_unpinned_buffer(state) {
                Some(buff) => {
                    buff.lock().assign_to_block(blk.clone())?;
                    buff
                }
                None => return Ok(None),
            },
        };
        let mut b = buff.lock();
        if !b.is_pinned() {
            state.num_available -= 1;
        }
        b.pin();
        drop(b);
        Ok(Some(buff))
    }

    fn find_existing_buffer(state: &PoolState, blk: &BlockId) -> Option<Arc<Mutex<Buffer>>> {
        state
            .pool
            .iter()
            .find(|buff| buff.lock().block() == Some(blk))
            .cloned()
    }

    fn choose_unpinned_buffer(state: &PoolState) -> Option<Arc<Mutex<Buffer>>> {
        state
            .pool
            .iter()
            .find(|buff| !buff.lock().is_pinned())
            .cloned()
    }
}
