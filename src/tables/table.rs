use integer_encoding::FixedInt;
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;

use crate::comparator::{BytewiseComparator, Comparator};
use crate::config::{BlockCompressionType, SIZE_OF_U32_BYTES, SIZE_OF_U64_BYTES};
use crate::errors::{SiltDbError, SiltDbResult};
use crate::fs::RandomAccessFile;
use crate::iterator::SiltDbIterator;
use crate::key::InternalKeyComparator;
use crate::options::{DbOptions, ReadOptions};
use crate::utils::cache::CacheHandle;
use crate::utils::crc::{unmask_checksum, CRC_CALCULATOR};

use super::block::{Block, BlockIter};
use super::block_handle::BlockHandle;
use super::constants::{BLOCK_DESCRIPTOR_SIZE_BYTES, FILTER_META_KEY_PREFIX};
use super::filter_block::FilterBlockReader;
use super::footer::{Footer, FOOTER_LENGTH_BYTES};

/**
An immutable, sorted table file opened for reading.

Opening a table reads and keeps the index block and, when a filter policy is configured, the
filter block. Data blocks are materialized on demand through the shared block cache.

# Concurrency

A table is thread-safe: its state is immutable after open apart from the block cache, which
synchronizes itself.
*/
pub struct Table {
    /// Database options to refer to when reading the table file.
    options: DbOptions,

    /// The underlying file holding the table data.
    file: Box<dyn RandomAccessFile>,

    /**
    The ID that prefixes this table's block cache keys.

    The block cache is shared by every table, so each reader partitions the key space with an
    ID of its own.
    */
    cache_id: u64,

    /// Handle to the metaindex block, kept for `approximate_offset_of`.
    metaindex_handle: BlockHandle,

    /// The table's index block.
    index_block: Block,

    /// The table's filter block reader, when the table has a usable filter.
    filter_block: Option<FilterBlockReader>,

    /// The comparator for the internal keys stored in the table.
    comparator: Arc<InternalKeyComparator>,
}

/// Public methods
impl Table {
    /// Open a table file and read the structures needed to serve lookups from it.
    pub fn open(options: DbOptions, file: Box<dyn RandomAccessFile>) -> SiltDbResult<Table> {
        let file_length = file.len()?;
        if file_length < FOOTER_LENGTH_BYTES as u64 {
            return Err(SiltDbError::Corruption(format!(
                "The file is too short ({} bytes) to be a table file.",
                file_length
            )));
        }

        log::debug!("Reading and parsing the table file footer");
        let mut footer_buf = vec![0; FOOTER_LENGTH_BYTES];
        let bytes_read =
            file.read_at(&mut footer_buf, file_length - FOOTER_LENGTH_BYTES as u64)?;
        if bytes_read < FOOTER_LENGTH_BYTES {
            return Err(SiltDbError::Corruption(
                "Failed to read a whole footer from the table file.".to_string(),
            ));
        }
        let footer = Footer::decode(&footer_buf)?;

        log::debug!("Reading and parsing the index block");
        let index_contents =
            read_block_from_disk(file.as_ref(), true, footer.get_index_handle())?;
        let index_block = Block::new(index_contents)?;

        let cache_id = options.block_cache().new_id();
        let comparator = Arc::new(InternalKeyComparator::new(options.comparator()));

        let mut table = Table {
            options,
            file,
            cache_id,
            metaindex_handle: footer.get_metaindex_handle().clone(),
            index_block,
            filter_block: None,
            comparator,
        };

        // A missing or unreadable filter block only costs performance, never correctness, so
        // failures degrade to running without one.
        match table.read_filter_block() {
            Ok(maybe_filter) => table.filter_block = maybe_filter,
            Err(error) => {
                log::warn!(
                    "Failed to read the filter block of a table file. Continuing without a \
                    filter. Original error: {}",
                    error
                );
            }
        }

        Ok(table)
    }

    /**
    Look up `internal_key` in the table.

    If the table holds an entry for the key's position, `record_fn` is invoked with the full
    entry found there. The caller decides what the entry means, e.g. whether its user key
    actually matches and whether it is a tombstone.
    */
    pub fn get(
        &self,
        read_options: &ReadOptions,
        internal_key: &[u8],
        record_fn: &mut dyn FnMut(&[u8], &[u8]),
    ) -> SiltDbResult<()> {
        let comparator = Arc::clone(&self.comparator) as Arc<dyn Comparator>;
        let mut index_iter = self.index_block.iter(Arc::clone(&comparator));
        index_iter.seek(internal_key);
        if !index_iter.is_valid() {
            // Past every data block, so the key is not in this table
            return index_iter.status();
        }

        let (block_handle, _) = BlockHandle::decode(index_iter.value())?;

        // Consult the filter before paying for a block read
        if let Some(filter) = &self.filter_block {
            if !filter.key_may_match(block_handle.get_offset(), internal_key) {
                return Ok(());
            }
        }

        let (block, cache_handle) = self.block_reader(read_options, &block_handle)?;
        let mut block_iter = block.iter(comparator);
        block_iter.seek(internal_key);
        if block_iter.is_valid() {
            record_fn(block_iter.key(), block_iter.value());
        }
        let block_status = block_iter.status();
        drop(block_iter);
        drop(block);
        if let Some(handle) = cache_handle {
            self.options.block_cache().release(handle);
        }
        block_status?;

        index_iter.status()
    }

    /**
    Get an iterator over the whole table.

    The iterator is two-level: an outer cursor walks the index block and an inner cursor
    walks the data block the outer one points at.
    */
    pub fn iter(table: Arc<Table>, read_options: ReadOptions) -> TwoLevelIterator {
        let comparator = Arc::clone(&table.comparator) as Arc<dyn Comparator>;
        let index_iter = table.index_block.iter(comparator);

        TwoLevelIterator {
            table,
            read_options,
            index_iter,
            data_iter: None,
            data_block_cache_handle: None,
            current_data_handle: None,
            error: None,
        }
    }

    /**
    The approximate file offset where the data for `internal_key` begins.

    The estimate is monotone non-decreasing in the key. Keys past the end of the table map to
    the offset of the metaindex block i.e. approximately the end of the data region.
    */
    pub fn approximate_offset_of(&self, internal_key: &[u8]) -> u64 {
        let comparator = Arc::clone(&self.comparator) as Arc<dyn Comparator>;
        let mut index_iter = self.index_block.iter(comparator);
        index_iter.seek(internal_key);
        if index_iter.is_valid() {
            if let Ok((handle, _)) = BlockHandle::decode(index_iter.value()) {
                return handle.get_offset();
            }
        }

        self.metaindex_handle.get_offset()
    }
}

/// Private methods
impl Table {
    /// Locate and read the filter block named by the configured filter policy.
    fn read_filter_block(&self) -> SiltDbResult<Option<FilterBlockReader>> {
        let filter_policy = match self.options.filter_policy() {
            Some(policy) => policy,
            None => return Ok(None),
        };

        let metaindex_contents =
            read_block_from_disk(self.file.as_ref(), true, &self.metaindex_handle)?;
        let metaindex_block = Block::new(metaindex_contents)?;

        let filter_key = format!("{}{}", FILTER_META_KEY_PREFIX, filter_policy.name());
        let mut metaindex_iter = metaindex_block.iter(Arc::new(BytewiseComparator));
        metaindex_iter.seek(filter_key.as_bytes());
        if !metaindex_iter.is_valid() || metaindex_iter.key() != filter_key.as_bytes() {
            // The table was built without this filter
            return Ok(None);
        }

        let (filter_handle, _) = BlockHandle::decode(metaindex_iter.value())?;
        let filter_contents = read_block_from_disk(self.file.as_ref(), true, &filter_handle)?;

        Ok(Some(FilterBlockReader::new(filter_policy, filter_contents)))
    }

    /**
    Get the data block at `block_handle`, through the block cache.

    On a cache hit the block comes back pinned by the returned cache handle. On a miss the
    block is read from disk and, when the read options allow, inserted into the cache charged
    at its in-memory size. The caller must release any returned cache handle once it is done
    with the block.
    */
    fn block_reader(
        &self,
        read_options: &ReadOptions,
        block_handle: &BlockHandle,
    ) -> SiltDbResult<(Arc<Block>, Option<CacheHandle>)> {
        let block_cache = self.options.block_cache();
        let cache_key = self.block_cache_key(block_handle.get_offset());

        if let Some(cache_handle) = block_cache.lookup(&cache_key) {
            let block = block_cache.value(&cache_handle);
            return Ok((block, Some(cache_handle)));
        }

        let contents = read_block_from_disk(
            self.file.as_ref(),
            read_options.verify_checksums,
            block_handle,
        )?;
        let block = Arc::new(Block::new(contents)?);

        if read_options.fill_cache {
            let charge = block.size();
            let cache_handle =
                block_cache.insert(cache_key, Arc::clone(&block), charge, None);
            return Ok((block, Some(cache_handle)));
        }

        Ok((block, None))
    }

    /// The block cache key for the block at `block_offset`: the table's cache ID and the
    /// offset, both fixed-width.
    fn block_cache_key(&self, block_offset: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(2 * SIZE_OF_U64_BYTES);
        key.extend(u64::encode_fixed_vec(self.cache_id));
        key.extend(u64::encode_fixed_vec(block_offset));

        key
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("cache_id", &self.cache_id)
            .field("metaindex_handle", &self.metaindex_handle)
            .finish()
    }
}

/**
Read, verify, and decompress the block at `block_handle`.

Returns the uncompressed block contents.
*/
fn read_block_from_disk(
    file: &dyn RandomAccessFile,
    verify_checksums: bool,
    block_handle: &BlockHandle,
) -> SiltDbResult<Vec<u8>> {
    let block_data_size = block_handle.get_size() as usize;
    let total_size = block_data_size + BLOCK_DESCRIPTOR_SIZE_BYTES;
    let mut raw = vec![0; total_size];
    let bytes_read = file.read_at(&mut raw, block_handle.get_offset())?;
    if bytes_read < total_size {
        return Err(SiltDbError::Corruption(
            "The file ended before the whole block could be read.".to_string(),
        ));
    }

    let compression_tag = raw[block_data_size];

    if verify_checksums {
        let stored_checksum =
            u32::decode_fixed(&raw[total_size - SIZE_OF_U32_BYTES..total_size]);
        let calculated_checksum =
            CRC_CALCULATOR.checksum(&raw[..block_data_size + 1]);
        if unmask_checksum(stored_checksum) != calculated_checksum {
            return Err(SiltDbError::Corruption(
                "Block checksum mismatch.".to_string(),
            ));
        }
    }

    match BlockCompressionType::try_from(compression_tag)? {
        BlockCompressionType::None => {
            raw.truncate(block_data_size);
            Ok(raw)
        }
        BlockCompressionType::Snappy => {
            let compressed = &raw[..block_data_size];
            let decompressed_length =
                snap::raw::decompress_len(compressed).map_err(|error| {
                    SiltDbError::Corruption(format!(
                        "Failed to read the length of a snappy-compressed block: {}",
                        error
                    ))
                })?;
            let mut decompressed = vec![0; decompressed_length];
            snap::raw::Decoder::new()
                .decompress(compressed, &mut decompressed)
                .map_err(|error| {
                    SiltDbError::Corruption(format!(
                        "Failed to decompress a snappy-compressed block: {}",
                        error
                    ))
                })?;

            Ok(decompressed)
        }
    }
}

/**
A two-level iterator over a whole table: the outer level walks the index block and the inner
level walks the data block the current index entry points at.

The iterator keeps the current data block pinned in the block cache and releases it whenever
it moves to a different block or is dropped.
*/
pub struct TwoLevelIterator {
    /// The table being iterated.
    table: Arc<Table>,

    /// Options governing the block reads the iterator performs.
    read_options: ReadOptions,

    /// Cursor over the index block.
    index_iter: BlockIter,

    /// Cursor over the current data block, when one is open.
    data_iter: Option<BlockIter>,

    /// Cache pin for the current data block.
    data_block_cache_handle: Option<CacheHandle>,

    /// The encoded handle of the current data block, to avoid reopening the same block.
    current_data_handle: Option<Vec<u8>>,

    /// The first error encountered, surfaced through `status`.
    error: Option<SiltDbError>,
}

/// Private methods
impl TwoLevelIterator {
    /// Open the data block the index cursor points at, reusing the current one if it is the
    /// same block.
    fn init_data_block(&mut self) {
        if !self.index_iter.is_valid() {
            self.close_data_block();
            return;
        }

        let handle_bytes = self.index_iter.value().to_vec();
        if self.current_data_handle.as_deref() == Some(handle_bytes.as_slice()) {
            // The cursor moved within the same data block
            return;
        }

        self.close_data_block();
        match BlockHandle::decode(&handle_bytes)
            .and_then(|(handle, _)| self.table.block_reader(&self.read_options, &handle))
        {
            Ok((block, cache_handle)) => {
                let comparator = Arc::clone(&self.table.comparator) as Arc<dyn Comparator>;
                self.data_iter = Some(block.iter(comparator));
                self.data_block_cache_handle = cache_handle;
                self.current_data_handle = Some(handle_bytes);
            }
            Err(error) => {
                if self.error.is_none() {
                    self.error = Some(error);
                }
            }
        }
    }

    /// Drop the current data block cursor and release its cache pin.
    fn close_data_block(&mut self) {
        self.data_iter = None;
        self.current_data_handle = None;
        if let Some(cache_handle) = self.data_block_cache_handle.take() {
            self.table.options.block_cache().release(cache_handle);
        }
    }

    /// Advance the outer cursor until it points at a data block with entries, positioning
    /// the inner cursor at that block's first entry.
    fn skip_empty_data_blocks_forward(&mut self) {
        while !self.data_iter_is_valid() {
            if !self.index_iter.is_valid() {
                self.close_data_block();
                return;
            }

            self.index_iter.next();
            self.init_data_block();
            if let Some(data_iter) = self.data_iter.as_mut() {
                data_iter.seek_to_first();
            }
        }
    }

    /// Retreat the outer cursor until it points at a data block with entries, positioning
    /// the inner cursor at that block's last entry.
    fn skip_empty_data_blocks_backward(&mut self) {
        while !self.data_iter_is_valid() {
            if !self.index_iter.is_valid() {
                self.close_data_block();
                return;
            }

            self.index_iter.prev();
            self.init_data_block();
            if let Some(data_iter) = self.data_iter.as_mut() {
                data_iter.seek_to_last();
            }
        }
    }

    /// Returns true if there is an inner cursor and it is positioned at an entry.
    fn data_iter_is_valid(&self) -> bool {
        self.data_iter
            .as_ref()
            .map(|data_iter| data_iter.is_valid())
            .unwrap_or(false)
    }
}

impl SiltDbIterator for TwoLevelIterator {
    fn is_valid(&self) -> bool {
        self.data_iter_is_valid()
    }

    fn seek(&mut self, target: &[u8]) {
        self.index_iter.seek(target);
        self.init_data_block();
        if let Some(data_iter) = self.data_iter.as_mut() {
            data_iter.seek(target);
        }
        self.skip_empty_data_blocks_forward();
    }

    fn seek_to_first(&mut self) {
        self.index_iter.seek_to_first();
        self.init_data_block();
        if let Some(data_iter) = self.data_iter.as_mut() {
            data_iter.seek_to_first();
        }
        self.skip_empty_data_blocks_forward();
    }

    fn seek_to_last(&mut self) {
        self.index_iter.seek_to_last();
        self.init_data_block();
        if let Some(data_iter) = self.data_iter.as_mut() {
            data_iter.seek_to_last();
        }
        self.skip_empty_data_blocks_backward();
    }

    fn next(&mut self) {
        assert!(self.is_valid());

        self.data_iter
            .as_mut()
            .expect("A valid iterator has a data cursor.")
            .next();
        self.skip_empty_data_blocks_forward();
    }

    fn prev(&mut self) {
        assert!(self.is_valid());

        self.data_iter
            .as_mut()
            .expect("A valid iterator has a data cursor.")
            .prev();
        self.skip_empty_data_blocks_backward();
    }

    fn key(&self) -> &[u8] {
        self.data_iter
            .as_ref()
            .expect("A valid iterator has a data cursor.")
            .key()
    }

    fn value(&self) -> &[u8] {
        self.data_iter
            .as_ref()
            .expect("A valid iterator has a data cursor.")
            .value()
    }

    fn status(&mut self) -> SiltDbResult<()> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }

        self.index_iter.status()?;
        if let Some(data_iter) = self.data_iter.as_mut() {
            data_iter.status()?;
        }

        Ok(())
    }
}

impl Drop for TwoLevelIterator {
    fn drop(&mut self) {
        self.close_data_block();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileSystem;
    use crate::key::{
        extract_user_key, InternalKey, LookupKey, Operation, MAX_SEQUENCE_NUMBER,
    };
    use crate::tables::TableBuilder;
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};

    const NUM_ENTRIES: usize = 3_000;

    /// Build a table of `key{num}` entries and open a reader over it.
    fn build_and_open_table(options: &DbOptions, file_number: u64) -> Arc<Table> {
        let fs = options.filesystem_provider();
        let path = table_path(file_number);
        fs.create_dir_all(path.parent().unwrap()).unwrap();
        let file = fs.create_file(&path).unwrap();
        let mut builder = TableBuilder::new(options.clone(), file);

        for num in 0..NUM_ENTRIES {
            let key = InternalKey::new(
                format!("key{num:06}").into_bytes(),
                num as u64,
                Operation::Put,
            );
            builder
                .add(&key.encode(), format!("value{num}").as_bytes())
                .unwrap();
        }
        builder.finish().unwrap();

        let file = fs.open_random_access_file(&path).unwrap();
        Arc::new(Table::open(options.clone(), file).unwrap())
    }

    fn table_path(file_number: u64) -> PathBuf {
        Path::new("/siltdb").join(format!("{file_number:06}.sst"))
    }

    /// Point lookup helper returning the value stored for the user key, if any.
    fn get_value(table: &Table, user_key: &[u8], sequence_number: u64) -> Option<Vec<u8>> {
        let lookup_key = LookupKey::new(user_key.to_vec(), sequence_number);
        let mut found = None;
        table
            .get(
                &ReadOptions::default(),
                lookup_key.internal_key(),
                &mut |key, value| {
                    if extract_user_key(key) == user_key {
                        found = Some(value.to_vec());
                    }
                },
            )
            .unwrap();

        found
    }

    #[test]
    fn point_lookups_find_stored_values() {
        let mut options = DbOptions::with_memory_env();
        options.max_block_size = 512;
        let table = build_and_open_table(&options, 1);

        assert_eq!(
            get_value(&table, b"key000117", MAX_SEQUENCE_NUMBER),
            Some(b"value117".to_vec())
        );
        assert_eq!(
            get_value(&table, b"key002999", MAX_SEQUENCE_NUMBER),
            Some(b"value2999".to_vec())
        );
        assert_eq!(get_value(&table, b"key999999", MAX_SEQUENCE_NUMBER), None);

        // A snapshot older than the entry's sequence number hides it
        assert_eq!(get_value(&table, b"key000117", 5), None);
    }

    #[test]
    fn iteration_yields_every_entry_in_order() {
        let mut options = DbOptions::with_memory_env();
        options.max_block_size = 256;
        let table = build_and_open_table(&options, 2);

        let mut iter = Table::iter(Arc::clone(&table), ReadOptions::default());
        iter.seek_to_first();
        for num in 0..NUM_ENTRIES {
            assert!(iter.is_valid(), "Iterator died at entry {num}");
            assert_eq!(
                extract_user_key(iter.key()),
                format!("key{num:06}").as_bytes()
            );
            assert_eq!(iter.value(), format!("value{num}").as_bytes());
            iter.next();
        }
        assert!(!iter.is_valid());
        assert!(iter.status().is_ok());
    }

    #[test]
    fn iteration_works_backwards_too() {
        let mut options = DbOptions::with_memory_env();
        options.max_block_size = 256;
        let table = build_and_open_table(&options, 3);

        let mut iter = Table::iter(Arc::clone(&table), ReadOptions::default());
        iter.seek_to_last();
        for num in (0..NUM_ENTRIES).rev() {
            assert!(iter.is_valid(), "Iterator died at entry {num}");
            assert_eq!(
                extract_user_key(iter.key()),
                format!("key{num:06}").as_bytes()
            );
            iter.prev();
        }
        assert!(!iter.is_valid());
    }

    #[test]
    fn seeking_positions_at_the_first_entry_at_or_past_the_target() {
        let mut options = DbOptions::with_memory_env();
        options.max_block_size = 256;
        let table = build_and_open_table(&options, 4);

        let mut iter = Table::iter(Arc::clone(&table), ReadOptions::default());

        let target = LookupKey::new(b"key001500".to_vec(), MAX_SEQUENCE_NUMBER);
        iter.seek(target.internal_key());
        assert!(iter.is_valid());
        assert_eq!(extract_user_key(iter.key()), b"key001500");

        // A target between stored keys lands on the next one
        let target = LookupKey::new(b"key001500a".to_vec(), MAX_SEQUENCE_NUMBER);
        iter.seek(target.internal_key());
        assert!(iter.is_valid());
        assert_eq!(extract_user_key(iter.key()), b"key001501");

        // A target past the last key invalidates the iterator
        let target = LookupKey::new(b"zzz".to_vec(), MAX_SEQUENCE_NUMBER);
        iter.seek(target.internal_key());
        assert!(!iter.is_valid());
    }

    #[test]
    fn approximate_offsets_are_monotone() {
        let mut options = DbOptions::with_memory_env();
        options.max_block_size = 256;
        let table = build_and_open_table(&options, 5);

        let mut previous_offset = 0;
        for num in (0..NUM_ENTRIES).step_by(100) {
            let key = LookupKey::new(format!("key{num:06}").into_bytes(), MAX_SEQUENCE_NUMBER);
            let offset = table.approximate_offset_of(key.internal_key());
            assert!(
                offset >= previous_offset,
                "Offset for entry {num} went backwards"
            );
            previous_offset = offset;
        }

        // A key past the end of the table maps approximately to the end of the data region
        let past_end = LookupKey::new(b"zzz".to_vec(), MAX_SEQUENCE_NUMBER);
        assert!(table.approximate_offset_of(past_end.internal_key()) >= previous_offset);
        assert!(
            table.approximate_offset_of(past_end.internal_key()) <= table.file.len().unwrap()
        );
    }

    #[test]
    fn lookups_are_served_from_the_block_cache_on_repeat() {
        let mut options = DbOptions::with_memory_env();
        options.max_block_size = 512;
        let table = build_and_open_table(&options, 6);

        assert_eq!(options.block_cache().total_charge(), 0);
        get_value(&table, b"key000100", MAX_SEQUENCE_NUMBER);
        let charge_after_first_read = options.block_cache().total_charge();
        assert!(charge_after_first_read > 0);

        // A repeat lookup of the same block adds nothing to the cache
        get_value(&table, b"key000100", MAX_SEQUENCE_NUMBER);
        assert_eq!(options.block_cache().total_charge(), charge_after_first_read);
    }

    #[test]
    fn scans_with_fill_cache_disabled_leave_the_cache_alone() {
        let mut options = DbOptions::with_memory_env();
        options.max_block_size = 512;
        let table = build_and_open_table(&options, 7);

        let read_options = ReadOptions {
            fill_cache: false,
            ..Default::default()
        };
        let mut iter = Table::iter(Arc::clone(&table), read_options);
        iter.seek_to_first();
        while iter.is_valid() {
            iter.next();
        }

        assert_eq!(options.block_cache().total_charge(), 0);
    }

    #[test]
    fn tables_without_a_filter_policy_still_serve_lookups() {
        let mut options = DbOptions::with_memory_env();
        options.max_block_size = 512;
        options.set_filter_policy(None);
        let table = build_and_open_table(&options, 8);

        assert_eq!(
            get_value(&table, b"key000700", MAX_SEQUENCE_NUMBER),
            Some(b"value700".to_vec())
        );
        assert_eq!(get_value(&table, b"nope", MAX_SEQUENCE_NUMBER), None);
    }

    #[test]
    fn corrupted_footers_fail_to_open() {
        let options = DbOptions::with_memory_env();
        let fs = options.filesystem_provider();
        let path = Path::new("/siltdb/garbage.sst");
        let mut file = fs.create_file(path).unwrap();
        file.append(&[0xab; 100]).unwrap();

        let file = fs.open_random_access_file(path).unwrap();
        assert!(Table::open(options, file).is_err());
    }
}
