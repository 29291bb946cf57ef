use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::{Buffer, BufferManager};
use crate::common::{Result, StoneDBError};
use crate::storage::BlockId;

/// The buffers a transaction currently has pinned, keyed by block. The
/// pool exclusively owns the Buffer objects and their pin counts; this
/// list stores block identities plus cloned pool handles, so repeated
/// accesses to the same block reuse the resolved buffer.
pub struct BufferList {
    buffers: HashMap<BlockId, Arc<Mutex<Buffer>>>,
    pins: Vec<BlockId>,
    bm: Arc<BufferManager>,
}

impl BufferList {
    pub fn new(bm: Arc<BufferManager>) -> Self {
        Self {
            buffers: HashMap::new(),
            pins: Vec::new(),
            bm,
        }
    }

    pub fn get_buffer(&self, blk: &BlockId) -> Option<Arc<Mutex<Buffer>>> {
        self.buffers.get(blk).cloned()
    }

    pub fn pin(&mut self, blk: &BlockId) -> Result<()> {
        let buff = self.bm.pin(blk)?;
        self.buffers.insert(blk.clone(), buff);
        self.pins.push(blk.clone());
        Ok(())
    }

    /// Drop one pin on the block; the buffer mapping goes away with the
    /// last pin.
    pub fn unpin(&mut self, blk: &BlockId) -> Result<()> {
        let buff = self
            .buffers
            .get(blk)
            .ok_or_else(|| StoneDBError::BlockNotPinned(blk.clone()))?;
        self.bm.unpin(buff)?;
        if let Some(pos) = self.pins.iter().position(|b| b == blk) {
            self.pins.remove(pos);
        }
        if !self.pins.contains(blk) {
            self.buffers.remove(blk);
        }
        Ok(())
    }

    /// Release every pin this transaction holds, including repeats.
    pub fn unpin_all(&mut self) -> Result<()> {
        for blk in &self.pins {
            if let Some(buff) = self.buffers.get(blk) {
                self.bm.unpin(buff)?;
            }
        }
        self.buffers.clear();
        self.pins.clear();
        Ok(())
    }
}
