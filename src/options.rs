/*!
This module holds the option structures that configure database behavior and individual read
and write operations.
*/

use std::fmt;
use std::sync::Arc;

use crate::comparator::{BytewiseComparator, Comparator};
use crate::config::{
    BlockCompressionType, DEFAULT_MAX_BLOCK_DATA_SIZE,
    DEFAULT_PREFIX_COMPRESSION_RESTART_INTERVAL,
};
use crate::filter_policy::{BloomFilterPolicy, FilterPolicy};
use crate::fs::{FileSystem, InMemoryFileSystem, OsFileSystem};
use crate::tables::Block;
use crate::utils::cache::ShardedLruCache;

/// Holds options that control database behavior.
#[derive(Clone)]
pub struct DbOptions {
    /**
    The maximum size that the memtable can reach before it is flushed to disk.

    **This defaults to 4 MiB.**
    */
    pub write_buffer_size: usize,

    /**
    The approximate maximum size of user data packed into a table file block.

    The size applies to uncompressed data; blocks may be smaller on disk after compression.

    **This defaults to 4 KiB.**
    */
    pub max_block_size: usize,

    /**
    The number of keys between restart points when prefix compressing block keys.

    **This defaults to 16.**
    */
    pub block_restart_interval: usize,

    /**
    The compression applied to table file blocks.

    Blocks that do not shrink meaningfully under compression are stored raw regardless.

    **This defaults to Snappy.**
    */
    pub compression_type: BlockCompressionType,

    /// The directory the database's files live under.
    db_path: String,

    /// The comparator defining the ordering of user keys.
    comparator: Arc<dyn Comparator>,

    /// A wrapper around a particular file system to use.
    filesystem_provider: Arc<dyn FileSystem>,

    /**
    The filter policy used to build and check per-table key summaries.

    [`None`] disables filters entirely.

    **This defaults to a Bloom filter with 10 bits per key.**
    */
    filter_policy: Option<Arc<dyn FilterPolicy>>,

    /**
    The cache of uncompressed table blocks shared by all table readers.

    **This defaults to an 8 MiB cache.**
    */
    block_cache: Arc<ShardedLruCache<Arc<Block>>>,
}

/// Public methods
impl DbOptions {
    /// Get the database path.
    pub fn db_path(&self) -> &str {
        self.db_path.as_str()
    }

    /// Get a strong reference to the user key comparator.
    pub fn comparator(&self) -> Arc<dyn Comparator> {
        Arc::clone(&self.comparator)
    }

    /// Get a strong reference to the file system provider.
    pub fn filesystem_provider(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.filesystem_provider)
    }

    /// Get a strong reference to the filter policy, if one is configured.
    pub fn filter_policy(&self) -> Option<Arc<dyn FilterPolicy>> {
        self.filter_policy.as_ref().map(Arc::clone)
    }

    /// Get a strong reference to the block cache.
    pub fn block_cache(&self) -> Arc<ShardedLruCache<Arc<Block>>> {
        Arc::clone(&self.block_cache)
    }

    /// Replace the filter policy. Passing [`None`] disables filters.
    pub fn set_filter_policy(&mut self, filter_policy: Option<Arc<dyn FilterPolicy>>) {
        self.filter_policy = filter_policy;
    }

    /// Replace the user key comparator.
    pub fn set_comparator(&mut self, comparator: Arc<dyn Comparator>) {
        self.comparator = comparator;
    }

    /**
    Create options backed by an in-memory file system.

    This is primarily useful for tests, which can exercise the full file formats without
    touching a disk.
    */
    pub fn with_memory_env() -> Self {
        DbOptions {
            db_path: "/siltdb".to_string(),
            filesystem_provider: Arc::new(InMemoryFileSystem::new()),
            ..Default::default()
        }
    }
}

impl Default for DbOptions {
    fn default() -> Self {
        DbOptions {
            db_path: ".".to_string(),
            write_buffer_size: 4 * 1024 * 1024,
            max_block_size: DEFAULT_MAX_BLOCK_DATA_SIZE,
            block_restart_interval: DEFAULT_PREFIX_COMPRESSION_RESTART_INTERVAL,
            compression_type: BlockCompressionType::Snappy,
            comparator: Arc::new(BytewiseComparator),
            filesystem_provider: Arc::new(OsFileSystem::new()),
            filter_policy: Some(Arc::new(BloomFilterPolicy::new(10))),
            block_cache: Arc::new(ShardedLruCache::new(8 * 1024 * 1024)),
        }
    }
}

impl fmt::Debug for DbOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbOptions")
            .field("db_path", &self.db_path)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("max_block_size", &self.max_block_size)
            .field("block_restart_interval", &self.block_restart_interval)
            .field("compression_type", &self.compression_type)
            .field("comparator", &self.comparator.name())
            .field("filesystem_provider", &self.filesystem_provider.get_name())
            .field(
                "filter_policy",
                &self.filter_policy.as_ref().map(|policy| policy.name()),
            )
            .finish()
    }
}

/// Options for read operations.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Verify the checksum of every block read as part of the operation.
    pub verify_checksums: bool,

    /**
    Cache blocks read as a result of the operation.

    Callers should set this to false for bulk scans so that a scan does not wash the working
    set out of the block cache.
    */
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            fill_cache: true,
        }
    }
}

/// Options for write operations.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /**
    Force the write-ahead log to durable storage before the write is acknowledged.

    A crash can lose unsynced writes the way a crash loses unflushed application buffers,
    but unsynced writes never corrupt the log.
    */
    pub sync: bool,
}
