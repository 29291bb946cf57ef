mod buffer_list;
mod transaction;

pub use buffer_list::BufferList;
pub use transaction::{Transaction, END_OF_FILE};
