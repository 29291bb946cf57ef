use std::fmt;

use crate::common::{Lsn, Result, StoneDBError, TxId};
use crate::log_mod::LogManager;
use crate::storage::{BlockId, Page};
use crate::transaction::Transaction;

const CHECKPOINT: i32 = 0;
const START: i32 = 1;
const COMMIT: i32 = 2;
const ROLLBACK: i32 = 3;
const SETINT: i32 = 4;
const SETSTRING: i32 = 5;

const INT_BYTES: usize = 4;

/// The six log record kinds. Every record payload begins with a 4-byte
/// opcode; only SetInt/SetString carry undo information, and the value they
/// carry is the OLD one, captured before the mutation was applied
/// (undo-only logging).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Checkpoint,
    Start(TxId),
    Commit(TxId),
    Rollback(TxId),
    SetInt {
        txnum: TxId,
        blk: BlockId,
        offset: usize,
        val: i32,
    },
    SetString {
        txnum: TxId,
        blk: BlockId,
        offset: usize,
        val: String,
    },
}

impl LogRecord {
    /// Decode a raw record by its leading opcode. An unrecognized opcode is
    /// a fatal parse error; there is no partial-record recovery.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let p = Page::from_bytes(bytes.to_vec());
        match p.get_int(0) {
            CHECKPOINT => Ok(LogRecord::Checkpoint),
            START => Ok(LogRecord::Start(TxId(p.get_int(INT_BYTES)))),
            COMMIT => Ok(LogRecord::Commit(TxId(p.get_int(INT_BYTES)))),
            ROLLBACK => Ok(LogRecord::Rollback(TxId(p.get_int(INT_BYTES)))),
            SETINT => {
                let (txnum, blk, offset, vpos) = decode_update_header(&p);
                Ok(LogRecord::SetInt {
                    txnum,
                    blk,
                    offset,
                    val: p.get_int(vpos),
                })
            }
            SETSTRING => {
                let (txnum, blk, offset, vpos) = decode_update_header(&p);
                Ok(LogRecord::SetString {
                    txnum,
                    blk,
                    offset,
                    val: p.get_string(vpos),
                })
            }
            op => Err(StoneDBError::UnknownLogRecord(op)),
        }
    }

    /// The transaction the record belongs to; None for Checkpoint, which
    /// belongs to no transaction.
    pub fn tx_number(&self) -> Option<TxId> {
        match self {
            LogRecord::Checkpoint => None,
            LogRecord::Start(txnum)
            | LogRecord::Commit(txnum)
            | LogRecord::Rollback(txnum) => Some(*txnum),
            LogRecord::SetInt { txnum, .. } | LogRecord::SetString { txnum, .. } => Some(*txnum),
        }
    }

    /// Re-apply the old value through the transaction with logging
    /// disabled, so undoing never appends new records. Non-mutation records
    /// undo to nothing.
    pub fn undo(&self, tx: &mut Transaction) -> Result<()> {
        match self {
            LogRecord::SetInt {
                blk, offset, val, ..
            } => {
                tx.pin(blk)?;
                tx.set_int(blk, *offset, *val, false)?;
                tx.unpin(blk)?;
                Ok(())
            }
            LogRecord::SetString {
                blk, offset, val, ..
            } => {
                tx.pin(blk)?;
                tx.set_string(blk, *offset, val, false)?;
                tx.unpin(blk)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn write_checkpoint(lm: &LogManager) -> Result<Lsn> {
        let mut p = Page::new(INT_BYTES);
        p.set_int(0, CHECKPOINT);
        lm.append(p.contents())
    }

    pub fn write_start(lm: &LogManager, txnum: TxId) -> Result<Lsn> {
        write_tx_only(lm, START, txnum)
    }

    pub fn write_commit(lm: &LogManager, txnum: TxId) -> Result<Lsn> {
        write_tx_only(lm, COMMIT, txnum)
    }

    pub fn write_rollback(lm: &LogManager, txnum: TxId) -> Result<Lsn> {
        write_tx_only(lm, ROLLBACK, txnum)
    }

    pub fn write_set_int(
        lm: &LogManager,
        txnum: TxId,
        blk: &BlockId,
        offset: usize,
        val: i32,
    ) -> Result<Lsn> {
        let (mut p, vpos) = encode_update_header(SETINT, txnum, blk, offset, INT_BYTES);
        p.set_int(vpos, val);
        lm.append(p.contents())
    }

    pub fn write_set_string(
        lm: &LogManager,
        txnum: TxId,
        blk: &BlockId,
        offset: usize,
        val: &str,
    ) -> Result<Lsn> {
        let (mut p, vpos) =
            encode_update_header(SETSTRING, txnum, blk, offset, Page::max_length(val.len()));
        p.set_string(vpos, val);
        lm.append(p.contents())
    }
}

/// Field layout shared by SetInt and SetString:
/// [opcode, txnum, filename, blknum, offset, old value].
fn decode_update_header(p: &Page) -> (TxId, BlockId, usize, usize) {
    let tpos = INT_BYTES;
    let txnum = TxId(p.get_int(tpos));
    let fpos = tpos + INT_BYTES;
    let filename = p.get_string(fpos);
    let bpos = fpos + Page::max_length(filename.len());
    let blknum = p.get_int(bpos);
    let opos = bpos + INT_BYTES;
    let offset = p.get_int(opos) as usize;
    let vpos = opos + INT_BYTES;
    (txnum, BlockId::new(filename, blknum), offset, vpos)
}

fn encode_update_header(
    op: i32,
    txnum: TxId,
    blk: &BlockId,
    offset: usize,
    val_len: usize,
) -> (Page, usize) {
    let tpos = INT_BYTES;
    let fpos = tpos + INT_BYTES;
    let bpos = fpos + Page::max_length(blk.file_name().len());
    let opos = bpos + INT_BYTES;
    let vpos = opos + INT_BYTES;
    let mut p = Page::new(vpos + val_len);
    p.set_int(0, op);
    p.set_int(tpos, txnum.0);
    p.set_string(fpos, blk.file_name());
    p.set_int(bpos, blk.number());
    p.set_int(opos, offset as i32);
    (p, vpos)
}

fn write_tx_only(lm: &LogManager, op: i32, txnum: TxId) -> Result<Lsn> {
    let mut p = Page::new(2 * INT_BYTES);
    p.set_int(0, op);
    p.set_int(INT_BYTES, txnum.0);
    lm.append(p.contents())
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Checkpoint => write!(f, "<CHECKPOINT>"),
            LogRecord::Start(txnum) => write!(f, "<START {}>", txnum),
            LogRecord::Commit(txnum) => write!(f, "<COMMIT {}>", txnum),
            LogRecord::Rollback(txnum) => write!(f, "<ROLLBACK {}>", txnum),
            LogRecord::SetInt {
                txnum,
                blk,
                offset,
                val,
            } => write!(f, "<SETINT {} {} {} {}>", txnum, blk, offset, val),
            LogRecord::SetString {
                txnum,
                blk,
                offset,
                val,
            } => write!(f, "<SETSTRING {} {} {} {}>", txnum, blk, offset, val),
        }
    }
}
