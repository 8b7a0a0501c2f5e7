/*!
This module provides a thread-safe cache of open table readers.

Opening a table costs a footer read, an index block read, and possibly a filter block read,
so readers are kept open and shared. Entries are charged one unit each, making the cache
capacity a count of open tables.
*/

use integer_encoding::FixedInt;
use std::sync::Arc;

use crate::errors::{SiltDbError, SiltDbResult};
use crate::file_names::FileNameHandler;
use crate::fs::FileSystem;
use crate::key::{extract_trailer, extract_user_key, LookupKey, Operation};
use crate::options::{DbOptions, ReadOptions};
use crate::tables::Table;
use crate::utils::cache::ShardedLruCache;

/// A thread-safe cache of open table readers keyed by file number.
pub struct TableCache {
    /// Database options to refer to when opening table files.
    options: DbOptions,

    /// The underlying cache storing the table readers.
    cache: ShardedLruCache<Arc<Table>>,

    /// Utility for constructing the paths of table files.
    file_name_handler: FileNameHandler,
}

/// Public methods
impl TableCache {
    /// Create a new [`TableCache`] that keeps at most `capacity` tables open.
    pub fn new(options: DbOptions, capacity: usize) -> Self {
        let file_name_handler = FileNameHandler::new(options.db_path());

        Self {
            options,
            cache: ShardedLruCache::new(capacity),
            file_name_handler,
        }
    }

    /**
    Look up the newest visible version of the key in the specified table file.

    Returns the stored value if that version is a put, a [`SiltDbError::NotFound`] if it is a
    tombstone, and `Ok(None)` if the table holds no version of the key at all so the caller
    can consult older tables.
    */
    pub fn get(
        &self,
        read_options: &ReadOptions,
        file_number: u64,
        lookup_key: &LookupKey,
    ) -> SiltDbResult<Option<Vec<u8>>> {
        let table = self.find_table(file_number)?;

        let user_comparator = self.options.comparator();
        let mut found: Option<(Vec<u8>, Operation)> = None;
        table.get(
            read_options,
            lookup_key.internal_key(),
            &mut |internal_key, value| {
                if user_comparator
                    .compare(extract_user_key(internal_key), lookup_key.user_key())
                    .is_eq()
                {
                    let operation = match (extract_trailer(internal_key) & 0xff) as u8 {
                        0 => Operation::Delete,
                        _ => Operation::Put,
                    };
                    found = Some((value.to_vec(), operation));
                }
            },
        )?;

        match found {
            Some((value, Operation::Put)) => Ok(Some(value)),
            Some((_, Operation::Delete)) => Err(SiltDbError::NotFound(Some(
                "The newest visible version of the key is a tombstone.".to_string(),
            ))),
            None => Ok(None),
        }
    }

    /// Get the (possibly cached) table reader for the given file number.
    pub fn find_table(&self, file_number: u64) -> SiltDbResult<Arc<Table>> {
        let cache_key = u64::encode_fixed_vec(file_number);

        if let Some(handle) = self.cache.lookup(&cache_key) {
            let table = self.cache.value(&handle);
            self.cache.release(handle);
            return Ok(table);
        }

        let table_path = self.file_name_handler.get_table_file_path(file_number);
        log::debug!("Opening the table file at {}", table_path.display());
        let file = self
            .options
            .filesystem_provider()
            .open_random_access_file(&table_path)?;
        let table = Arc::new(Table::open(self.options.clone(), file)?);

        let handle = self
            .cache
            .insert(cache_key, Arc::clone(&table), 1, None);
        self.cache.release(handle);

        Ok(table)
    }

    /**
    Drop the cached reader for the given file number.

    This is used when a table file is deleted after compaction so the cache does not keep the
    dead file open.
    */
    pub fn evict(&self, file_number: u64) {
        self.cache.erase(&u64::encode_fixed_vec(file_number));
    }
}
