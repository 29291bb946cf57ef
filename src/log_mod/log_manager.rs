use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::common::{Lsn, Result};
use crate::storage::{BlockId, FileManager, Page};

const INT_BYTES: usize = 4;

/// Append-only log of length-prefixed records.
///
/// Records are packed into the in-memory tail block right-to-left: offset 0
/// of every log block holds a "boundary", the byte offset of the earliest
/// valid record in that block. New records grow downward from the boundary,
/// so the single boundary integer is all the iterator needs to walk a block
/// newest-to-oldest without any record count.
#[derive(Debug)]
pub struct LogManager {
    fm: Arc<FileManager>,
    logfile: String,
    state: Mutex<LogState>,
}

#[derive(Debug)]
struct LogState {
    logpage: Page,
    currentblk: BlockId,
    latest_lsn: u64,
    last_saved_lsn: u64,
}

impl LogManager {
    pub fn new(fm: Arc<FileManager>, logfile: impl Into<String>) -> Result<Self> {
        let logfile = logfile.into();
        let mut logpage = Page::new(fm.block_size());
        let logsize = fm.length(&logfile)?;

        let currentblk = if logsize == 0 {
            Self::append_new_block(&fm, &logfile, &mut logpage)?
        } else {
            let blk = BlockId::new(logfile.clone(), logsize - 1);
            fm.read(&blk, &mut logpage)?;
            blk
        };

        Ok(Self {
            fm,
            logfile,
            state: Mutex::new(LogState {
                logpage,
                currentblk,
                latest_lsn: 0,
                last_saved_lsn: 0,
            }),
        })
    }

    /// Append a record to the tail block, spilling to a fresh block when it
    /// no longer fits, and return the record's LSN. The record is not
    /// guaranteed durable until a flush covering that LSN.
    pub fn append(&self, logrec: &[u8]) -> Result<Lsn> {
        let mut state = self.state.lock();

        let mut boundary = state.logpage.get_int(0) as usize;
        let bytes_needed = logrec.len() + INT_BYTES;
        if (boundary as i64 - bytes_needed as i64) < INT_BYTES as i64 {
            self.write_tail(&mut state)?;
            state.currentblk = Self::append_new_block(&self.fm, &self.logfile, &mut state.logpage)?;
            boundary = state.logpage.get_int(0) as usize;
        }

        let recpos = boundary - bytes_needed;
        state.logpage.set_bytes(recpos, logrec);
        state.logpage.set_int(0, recpos as i32);
        state.latest_lsn += 1;
        trace!("appended log record, lsn {}", state.latest_lsn);
        Ok(Lsn(state.latest_lsn))
    }

    /// Ensure every record up to `lsn` is durable. A no-op if a previous
    /// flush already covered it.
    pub fn flush_lsn(&self, lsn: Lsn) -> Result<()> {
        let mut state = self.state.lock();
        if lsn.0 >= state.last_saved_lsn {
            self.write_tail(&mut state)?;
        }
        Ok(())
    }

    /// Unconditionally write the tail block.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.write_tail(&mut state)
    }

    /// Iterate over records newest-to-oldest. Forces a flush first so the
    /// iterator sees the in-memory tail.
    pub fn iterator(&self) -> Result<LogIterator> {
        let currentblk = {
            let mut state = self.state.lock();
            self.write_tail(&mut state)?;
            state.currentblk.clone()
        };
        LogIterator::new(Arc::clone(&self.fm), currentblk)
    }

    fn write_tail(&self, state: &mut LogState) -> Result<()> {
        self.fm.write(&state.currentblk, &state.logpage)?;
        state.last_saved_lsn = state.latest_lsn;
        Ok(())
    }

    /// A fresh log block starts with its boundary at the block size, i.e.
    /// empty. The block is written out immediately so the file length
    /// reflects it.
    fn append_new_block(fm: &FileManager, logfile: &str, logpage: &mut Page) -> Result<BlockId> {
        let blk = fm.append(logfile)?;
        logpage.contents_mut().fill(0);
        logpage.set_int(0, fm.block_size() as i32);
        fm.write(&blk, logpage)?;
        Ok(blk)
    }
}

/// Walks the log from the newest record to the oldest: left-to-right inside
/// the highest block starting at its boundary, then down one block at a
/// time to block 0.
pub struct LogIterator {
    fm: Arc<FileManager>,
    blk: BlockId,
    page: Page,
    currentpos: usize,
}

impl LogIterator {
    fn new(fm: Arc<FileManager>, blk: BlockId) -> Result<Self> {
        let mut iter = Self {
            page: Page::new(fm.block_size()),
            fm,
            blk: blk.clone(),
            currentpos: 0,
        };
        iter.move_to_block(blk)?;
        Ok(iter)
    }

    fn has_next(&self) -> bool {
        self.currentpos < self.fm.block_size() || self.blk.number() > 0
    }

    fn move_to_block(&mut self, blk: BlockId) -> Result<()> {
        self.fm.read(&blk, &mut self.page)?;
        self.currentpos = self.page.get_int(0) as usize;
        self.blk = blk;
        Ok(())
    }

    fn read_next(&mut self) -> Result<Vec<u8>> {
        if self.currentpos == self.fm.block_size() {
            let prev = BlockId::new(self.blk.file_name().to_string(), self.blk.number() - 1);
            self.move_to_block(prev)?;
        }
        let rec = self.page.get_bytes(self.currentpos).to_vec();
        self.currentpos += INT_BYTES + rec.len();
        Ok(rec)
    }
}

impl Iterator for LogIterator {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(self.read_next())
    }
}
