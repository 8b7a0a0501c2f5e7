/*!
The immutable sorted table (SSTable) file format: block building and reading, filter blocks,
the footer, and the table-level builder and reader that assemble them.
*/

pub(crate) mod constants;

mod block;
mod block_builder;
mod block_handle;
mod filter_block;
mod filter_block_builder;
mod footer;
mod table;
mod table_builder;

pub use block::{Block, BlockIter};
pub use table::{Table, TwoLevelIterator};
pub use table_builder::TableBuilder;
