use std::time::Duration;

use thiserror::Error;

use crate::storage::BlockId;

#[derive(Debug, Error)]
pub enum StoneDBError {
    /// No buffer frame became free within the wait bound. The caller should
    /// roll back the whole transaction and retry it.
    #[error("buffer pool exhausted: no frame freed within {0:?}")]
    BufferAbort(Duration),

    /// A lock request could not be granted within the wait bound. Same
    /// remedy as BufferAbort: roll back and retry.
    #[error("lock wait timed out after {timeout:?} on {blk}")]
    LockAbort { blk: BlockId, timeout: Duration },

    #[error("I/O error on {file}: {source}")]
    Io {
        file: String,
        source: std::io::Error,
    },

    #[error("unknown log record opcode {0}")]
    UnknownLogRecord(i32),

    #[error("block {0} is not pinned by this transaction")]
    BlockNotPinned(BlockId),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StoneDBError>;
