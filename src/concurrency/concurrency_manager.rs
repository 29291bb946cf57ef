use std::collections::HashMap;
use std::sync::Arc;

use crate::common::Result;
use crate::concurrency::LockTable;
use crate::storage::BlockId;

/// What this transaction currently holds on a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Per-transaction lock bookkeeping over the shared LockTable. The local
/// map only avoids redundant table calls and remembers what to release;
/// the table holds the authoritative state.
///
/// Locks are released only by `release()`, which the transaction calls at
/// commit or rollback and never earlier: strict two-phase locking.
pub struct ConcurrencyManager {
    locktbl: Arc<LockTable>,
    locks: HashMap<BlockId, LockMode>,
}

impl ConcurrencyManager {
    pub fn new(locktbl: Arc<LockTable>) -> Self {
        Self {
            locktbl,
            locks: HashMap::new(),
        }
    }

    /// Acquire a shared lock, unless this transaction already holds one
    /// (of either mode) on the block.
    pub fn s_lock(&mut self, blk: &BlockId) -> Result<()> {
        if !self.locks.contains_key(blk) {
            self.locktbl.s_lock(blk)?;
            self.locks.insert(blk.clone(), LockMode::Shared);
        }
        Ok(())
    }

    /// Acquire an exclusive lock. A shared lock is taken first so this
    /// transaction's own hold is reflected in the table's counter before
    /// the upgrade waits out other holders.
    pub fn x_lock(&mut self, blk: &BlockId) -> Result<()> {
        if !self.has_x_lock(blk) {
            self.s_lock(blk)?;
            self.locktbl.x_lock(blk)?;
            self.locks.insert(blk.clone(), LockMode::Exclusive);
        }
        Ok(())
    }

    /// Release every lock this transaction holds.
    pub fn release(&mut self) {
        for blk in self.locks.keys() {
            self.locktbl.unlock(blk);
        }
        self.locks.clear();
    }

    fn has_x_lock(&self, blk: &BlockId) -> bool {
        self.locks.get(blk) == Some(&LockMode::Exclusive)
    }
}
