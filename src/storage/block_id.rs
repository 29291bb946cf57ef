use std::fmt;

/// Identifies a block by the file it lives in and its position within that
/// file. Block number -1 is used by the transaction layer as an
/// "end of file" sentinel that is locked but never read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    filename: String,
    num: i32,
}

impl BlockId {
    pub fn new(filename: impl Into<String>, num: i32) -> Self {
        Self {
            filename: filename.into(),
            num,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.filename
    }

    pub fn number(&self) -> i32 {
        self.num
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.filename, self.num)
    }
}
