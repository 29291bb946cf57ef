use std::sync::Arc;

use log::debug;

use crate::buffer::{Buffer, BufferManager};
use crate::common::{Lsn, Result, StoneDBError, TxId};
use crate::log_mod::LogManager;
use crate::recovery::LogRecord;
use crate::storage::BlockId;
use crate::transaction::Transaction;

/// Per-transaction undo logging and recovery driver. Construction writes
/// the transaction's Start record.
///
/// Commits are FORCE'd: every dirty buffer of the transaction is flushed
/// before the Commit record goes out, so recovery never needs a redo phase
/// and only undoes transactions that were in flight at crash time.
#[derive(Clone)]
pub struct RecoveryManager {
    lm: Arc<LogManager>,
    bm: Arc<BufferManager>,
    txnum: TxId,
}

impl RecoveryManager {
    pub fn new(txnum: TxId, lm: Arc<LogManager>, bm: Arc<BufferManager>) -> Result<Self> {
        LogRecord::write_start(&lm, txnum)?;
        Ok(Self { lm, bm, txnum })
    }

    pub fn commit(&self) -> Result<()> {
        self.bm.flush_all(self.txnum)?;
        let lsn = LogRecord::write_commit(&self.lm, self.txnum)?;
        self.lm.flush_lsn(lsn)
    }

    /// Undo everything this transaction logged, newest first, then mark the
    /// log with a Rollback record.
    pub fn rollback(&self, tx: &mut Transaction) -> Result<()> {
        self.do_rollback(tx)?;
        self.bm.flush_all(self.txnum)?;
        let lsn = LogRecord::write_rollback(&self.lm, self.txnum)?;
        self.lm.flush_lsn(lsn)
    }

    /// Crash recovery: undo every logged mutation of every transaction that
    /// never reached Commit or Rollback, then mark the log with a
    /// Checkpoint so later recovery runs stop here.
    pub fn recover(&self, tx: &mut Transaction) -> Result<()> {
        self.do_recover(tx)?;
        self.bm.flush_all(self.txnum)?;
        let lsn = LogRecord::write_checkpoint(&self.lm)?;
        self.lm.flush_lsn(lsn)
    }

    /// Append the undo record for an int write: the OLD value is read from
    /// the page before the caller mutates it.
    pub fn set_int(&self, buff: &Buffer, offset: usize) -> Result<Lsn> {
        let oldval = buff.contents().get_int(offset);
        let blk = buffer_block(buff)?;
        LogRecord::write_set_int(&self.lm, self.txnum, &blk, offset, oldval)
    }

    /// Append the undo record for a string write.
    pub fn set_string(&self, buff: &Buffer, offset: usize) -> Result<Lsn> {
        let oldval = buff.contents().get_string(offset);
        let blk = buffer_block(buff)?;
        LogRecord::write_set_string(&self.lm, self.txnum, &blk, offset, &oldval)
    }

    /// Scan the log newest-to-oldest, undoing this transaction's records
    /// until its own Start record is reached.
    fn do_rollback(&self, tx: &mut Transaction) -> Result<()> {
        for bytes in self.lm.iterator()? {
            let rec = LogRecord::from_bytes(&bytes?)?;
            if rec.tx_number() == Some(self.txnum) {
                if let LogRecord::Start(_) = rec {
                    return Ok(());
                }
                debug!("undoing {}", rec);
                rec.undo(tx)?;
            }
        }
        Ok(())
    }

    /// Scan the log newest-to-oldest, collecting finished transactions and
    /// undoing every record of the unfinished ones. A Checkpoint record
    /// asserts nothing earlier needs undo consideration, so the scan stops
    /// there.
    fn do_recover(&self, tx: &mut Transaction) -> Result<()> {
        let mut finished_txs: Vec<TxId> = Vec::new();
        for bytes in self.lm.iterator()? {
            let rec = LogRecord::from_bytes(&bytes?)?;
            match rec {
                LogRecord::Checkpoint => return Ok(()),
                LogRecord::Commit(txnum) | LogRecord::Rollback(txnum) => {
                    finished_txs.push(txnum);
                }
                _ => {
                    if let Some(txnum) = rec.tx_number() {
                        if !finished_txs.contains(&txnum) {
                            debug!("undoing {}", rec);
                            rec.undo(tx)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn buffer_block(buff: &Buffer) -> Result<BlockId> {
    buff.block()
        .cloned()
        .ok_or_else(|| StoneDBError::Other("buffer is not assigned to a block".to_string()))
}
