/*!
SiltDB is an embedded, persistent, ordered key-value store organized as a log-structured
merge-tree.

Byte-string keys map to byte-string values with multi-version semantics: every mutation is
stamped with a monotonically increasing sequence number and readers observe the snapshot
defined by such a number. Writes land in a write-ahead log and an in-memory table; immutable
sorted table files serve older data through a shared block cache.

This crate provides the storage-engine core: the write path (batches, the log, the memtable),
the versioned key encoding, the table file format with its builder and reader, and the block
cache. Orchestration concerns such as compaction scheduling and version tracking sit above
these components.
*/

pub mod comparator;
pub mod filter_policy;
pub mod fs;

mod config;
mod errors;
mod file_names;
mod iterator;
mod key;
mod memtable;
mod skiplist;
mod snapshots;
mod table_cache;
mod tables;
mod utils;
mod write_ahead_log;

mod batch;
pub use batch::{Batch, BatchHandler};

pub use config::BlockCompressionType;
pub use errors::{SiltDbError, SiltDbResult};
pub use iterator::SiltDbIterator;
pub use key::{
    InternalKey, InternalKeyComparator, LookupKey, Operation, MAX_SEQUENCE_NUMBER,
};
pub use memtable::{MemTable, MemTableIter};
pub use snapshots::{Snapshot, SnapshotList};
pub use table_cache::TableCache;
pub use tables::{Block, BlockIter, Table, TableBuilder, TwoLevelIterator};
pub use utils::cache::{CacheHandle, DeleterFn, ShardedLruCache};
pub use write_ahead_log::{CorruptionReporter, LogReader, LogWriter};

pub mod options;
pub use options::{DbOptions, ReadOptions, WriteOptions};
