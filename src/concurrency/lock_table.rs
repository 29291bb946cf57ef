use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::common::{Result, StoneDBError};
use crate::storage::BlockId;

/// Process-wide shared/exclusive lock state, one entry per block:
/// -1 when a transaction holds an exclusive lock, otherwise the number of
/// transactions holding shared locks. Absent means free.
///
/// There is one LockTable per process, constructed explicitly and injected
/// into every per-transaction ConcurrencyManager. There is no deadlock
/// detection; conflicting waits are bounded and convert into LockAbort.
pub struct LockTable {
    locks: Mutex<HashMap<BlockId, i32>>,
    cond: Condvar,
    max_time: Duration,
}

impl LockTable {
    pub fn new(max_time: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            cond: Condvar::new(),
            max_time,
        }
    }

    /// Acquire a shared lock, waiting out any exclusive holder. Waiters are
    /// woken on every unlock and re-check.
    pub fn s_lock(&self, blk: &BlockId) -> Result<()> {
        let deadline = Instant::now() + self.max_time;
        let mut locks = self.locks.lock();
        while Self::has_x_lock(&locks, blk) {
            let now = Instant::now();
            if now >= deadline {
                debug!("slock on {} timed out", blk);
                return Err(self.abort(blk));
            }
            self.cond.wait_for(&mut locks, deadline - now);
        }
        let val = Self::lock_val(&locks, blk);
        locks.insert(blk.clone(), val + 1);
        debug!("granted slock on {}, holders {}", blk, val + 1);
        Ok(())
    }

    /// Promote to an exclusive lock. The caller must already hold its own
    /// shared lock on the block, so a count of 1 means no other holders.
    pub fn x_lock(&self, blk: &BlockId) -> Result<()> {
        let deadline = Instant::now() + self.max_time;
        let mut locks = self.locks.lock();
        while Self::has_other_s_locks(&locks, blk) {
            let now = Instant::now();
            if now >= deadline {
                debug!("xlock on {} timed out", blk);
                return Err(self.abort(blk));
            }
            self.cond.wait_for(&mut locks, deadline - now);
        }
        locks.insert(blk.clone(), -1);
        debug!("granted xlock on {}", blk);
        Ok(())
    }

    /// Release one hold: decrement the shared count, or clear the entry and
    /// wake all waiters when this was the last holder.
    pub fn unlock(&self, blk: &BlockId) {
        let mut locks = self.locks.lock();
        let val = Self::lock_val(&locks, blk);
        if val > 1 {
            locks.insert(blk.clone(), val - 1);
        } else {
            locks.remove(blk);
            self.cond.notify_all();
        }
        debug!("released lock on {}", blk);
    }

    fn abort(&self, blk: &BlockId) -> StoneDBError {
        StoneDBError::LockAbort {
            blk: blk.clone(),
            timeout: self.max_time,
        }
    }

    fn has_x_lock(locks: &HashMap<BlockId, i32>, blk: &BlockId) -> bool {
        Self::lock_val(locks, blk) < 0
    }

    fn has_other_s_locks(locks: &HashMap<BlockId, i32>, blk: &BlockId) -> bool {
        Self::lock_val(locks, blk) > 1
    }

    fn lock_val(locks: &HashMap<BlockId, i32>, blk: &BlockId) -> i32 {
        locks.get(blk).copied().unwrap_or(0)
    }
}
