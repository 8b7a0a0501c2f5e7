use std::sync::Arc;

use integer_encoding::FixedInt;

use crate::comparator::{BytewiseComparator, Comparator};
use crate::config::BlockCompressionType;
use crate::errors::{SiltDbError, SiltDbResult};
use crate::fs::WritableFile;
use crate::key::InternalKeyComparator;
use crate::options::DbOptions;
use crate::utils::crc::masked_crc;

use super::block_builder::BlockBuilder;
use super::block_handle::BlockHandle;
use super::constants::FILTER_META_KEY_PREFIX;
use super::filter_block_builder::FilterBlockBuilder;
use super::footer::Footer;

/**
Builds a table file from a strictly increasing stream of internal key and value pairs.

# Format

A table file is laid out as:

1. A series of data blocks
1. An optional filter block summarizing the keys per 2 KiB region of data
1. A metaindex block mapping filter policy names to the filter block
1. An index block with one separator entry per data block
1. A fixed-length footer locating the metaindex and index blocks

Index entries are added lazily: when a data block fills up, its handle is held as pending
until the next key arrives, so the index key can be a shortened separator that sorts between
the two blocks rather than the full last key.
*/
pub struct TableBuilder {
    /// Options for configuring the table file being built.
    options: DbOptions,

    /// The table file being appended to.
    file: Box<dyn WritableFile>,

    /// The file offset where the next block will land.
    offset: u64,

    /// The number of entries added so far.
    num_entries: usize,

    /// Set once the table was finished or abandoned.
    closed: bool,

    /// Builder for the data block currently being filled.
    data_block: BlockBuilder,

    /// Builder for the index block.
    index_block: BlockBuilder,

    /// Builder for the filter block, when a filter policy is configured.
    filter_block: Option<FilterBlockBuilder>,

    /// The last key that was added.
    last_key: Vec<u8>,

    /// The comparator for the internal keys being added.
    comparator: Arc<InternalKeyComparator>,

    /**
    True when a data block was just flushed and its index entry has not been written yet.

    The entry is written on the next `add` (or at `finish`) so that the index key can be
    shortened against the first key of the following block.
    */
    pending_index_entry: bool,

    /// The handle of the data block awaiting its index entry.
    pending_handle: BlockHandle,
}

/// Public methods
impl TableBuilder {
    /// Create a new [`TableBuilder`] writing to `file`.
    pub fn new(options: DbOptions, file: Box<dyn WritableFile>) -> Self {
        let comparator = Arc::new(InternalKeyComparator::new(options.comparator()));
        let data_block = BlockBuilder::new(
            options.block_restart_interval,
            Arc::clone(&comparator) as Arc<dyn Comparator>,
        );
        // Index entries are binary-searched by full key, so every entry restarts
        let index_block = BlockBuilder::new(1, Arc::clone(&comparator) as Arc<dyn Comparator>);
        let mut filter_block = options
            .filter_policy()
            .map(FilterBlockBuilder::new);
        if let Some(filter_builder) = filter_block.as_mut() {
            filter_builder.start_block(0);
        }

        Self {
            options,
            file,
            offset: 0,
            num_entries: 0,
            closed: false,
            data_block,
            index_block,
            filter_block,
            last_key: vec![],
            comparator,
            pending_index_entry: false,
            pending_handle: BlockHandle::new(0, 0),
        }
    }

    /**
    Add a key-value pair to the table.

    Returns [`SiltDbError::InvalidArgument`] if `key` does not sort strictly after every
    previously added key.

    # Panics

    The table must not have been finished or abandoned.
    */
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> SiltDbResult<()> {
        assert!(!self.closed, "Attempted to add to a closed table builder.");

        if self.num_entries > 0 && self.comparator.compare(key, &self.last_key).is_le() {
            return Err(SiltDbError::InvalidArgument(
                "Keys must be added to a table in strictly increasing order.".to_string(),
            ));
        }

        if self.pending_index_entry {
            debug_assert!(self.data_block.is_empty());

            // The previous block's index key only needs to land between that block's last
            // key and this first key of the new block
            let mut separator = self.last_key.clone();
            self.comparator.find_shortest_separator(&mut separator, key);
            self.index_block.add(&separator, &self.pending_handle.encode());
            self.pending_index_entry = false;
        }

        if let Some(filter_builder) = self.filter_block.as_mut() {
            filter_builder.add_key(key);
        }

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.num_entries += 1;
        self.data_block.add(key, value);

        if self.data_block.current_size_estimate() >= self.options.max_block_size {
            self.flush()?;
        }

        Ok(())
    }

    /**
    Force the current data block out to the file.

    # Panics

    The table must not have been finished or abandoned.
    */
    pub fn flush(&mut self) -> SiltDbResult<()> {
        assert!(!self.closed, "Attempted to flush a closed table builder.");
        if self.data_block.is_empty() {
            return Ok(());
        }
        debug_assert!(
            !self.pending_index_entry,
            "A flushed block must get its index entry before the next flush."
        );

        let contents = self.data_block.finish();
        self.pending_handle = self.write_block(contents)?;
        self.data_block.reset();
        self.pending_index_entry = true;
        self.file.flush()?;

        if let Some(filter_builder) = self.filter_block.as_mut() {
            filter_builder.start_block(self.offset);
        }

        Ok(())
    }

    /**
    Finish building the table.

    Flushes the open data block, then writes the filter block, the metaindex block, the index
    block, and the footer.

    # Panics

    The table must not have been finished or abandoned already.
    */
    pub fn finish(&mut self) -> SiltDbResult<()> {
        self.flush()?;
        assert!(!self.closed, "Attempted to finish a closed table builder.");
        self.closed = true;

        // Write the filter block. It is stored raw: filters are already dense, and readers
        // locate filters by offsets into the uncompressed payload.
        let mut filter_handle = None;
        if let Some(filter_builder) = self.filter_block.as_mut() {
            let contents = filter_builder.finish();
            filter_handle =
                Some(self.write_raw_block(&contents, BlockCompressionType::None)?);
        }

        // Write the metaindex block. Like the index block, its entries are searched by full
        // key, so every entry restarts.
        let mut metaindex_block = BlockBuilder::new(1, Arc::new(BytewiseComparator));
        if let Some(handle) = &filter_handle {
            let filter_policy = self
                .options
                .filter_policy()
                .expect("A filter block implies a configured policy.");
            let meta_key = format!("{}{}", FILTER_META_KEY_PREFIX, filter_policy.name());
            metaindex_block.add(meta_key.as_bytes(), &handle.encode());
        }
        let metaindex_handle = self.write_block(metaindex_block.finish())?;

        // Write the index block, closing out the final data block's entry
        if self.pending_index_entry {
            let mut final_key = self.last_key.clone();
            self.comparator.find_short_successor(&mut final_key);
            self.index_block.add(&final_key, &self.pending_handle.encode());
            self.pending_index_entry = false;
        }
        let index_contents = self.index_block.finish();
        let index_handle = self.write_block(index_contents)?;

        // Write the footer
        let footer = Footer::new(metaindex_handle, index_handle);
        let footer_bytes = footer.encode();
        self.file.append(&footer_bytes)?;
        self.offset += footer_bytes.len() as u64;
        self.file.flush()?;

        Ok(())
    }

    /**
    Indicate that the contents of the builder should be abandoned.

    A builder that is not finished must be abandoned before it is dropped so that partially
    written files are never mistaken for tables.
    */
    pub fn abandon(&mut self) {
        assert!(!self.closed, "Attempted to abandon a closed table builder.");
        self.closed = true;
    }

    /// The number of entries added so far.
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// The current size of the table file.
    pub fn file_size(&self) -> u64 {
        self.offset
    }
}

/// Private methods
impl TableBuilder {
    /**
    Compress (when configured and worthwhile) and write one block.

    Compressed output is kept only when it shrinks the block by at least 12.5%; blocks that
    barely compress are stored raw to save decompression work on every future read.
    */
    fn write_block(&mut self, contents: Vec<u8>) -> SiltDbResult<BlockHandle> {
        match self.options.compression_type {
            BlockCompressionType::None => {
                self.write_raw_block(&contents, BlockCompressionType::None)
            }
            BlockCompressionType::Snappy => {
                let compressed = snap::raw::Encoder::new()
                    .compress_vec(&contents)
                    .map_err(|error| {
                        SiltDbError::Corruption(format!(
                            "Failed to snappy-compress a block: {}",
                            error
                        ))
                    })?;

                if compressed.len() < contents.len() - contents.len() / 8 {
                    self.write_raw_block(&compressed, BlockCompressionType::Snappy)
                } else {
                    self.write_raw_block(&contents, BlockCompressionType::None)
                }
            }
        }
    }

    /// Append a block and its descriptor to the file, returning the block's handle.
    fn write_raw_block(
        &mut self,
        contents: &[u8],
        compression_type: BlockCompressionType,
    ) -> SiltDbResult<BlockHandle> {
        let handle = BlockHandle::new(self.offset, contents.len() as u64);
        self.file.append(contents)?;

        // The block descriptor: compression type then the masked checksum of the contents
        // and the compression type together
        let compression_byte = [compression_type as u8];
        let checksum = masked_crc(&[contents, &compression_byte]);
        self.file.append(&compression_byte)?;
        self.file.append(&u32::encode_fixed_vec(checksum))?;

        self.offset +=
            (contents.len() + super::constants::BLOCK_DESCRIPTOR_SIZE_BYTES) as u64;

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileSystem, RandomAccessFile};
    use crate::key::{InternalKey, Operation};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn out_of_order_adds_are_invalid_arguments() {
        let options = DbOptions::with_memory_env();
        let file = options
            .filesystem_provider()
            .create_file(Path::new("/siltdb/000001.sst"))
            .unwrap();
        let mut builder = TableBuilder::new(options, file);

        builder
            .add(&InternalKey::new(b"b".to_vec(), 1, Operation::Put).encode(), b"value")
            .unwrap();
        let result =
            builder.add(&InternalKey::new(b"a".to_vec(), 2, Operation::Put).encode(), b"value");

        assert!(matches!(result, Err(SiltDbError::InvalidArgument(_))));
        builder.abandon();
    }

    #[test]
    fn newer_versions_of_a_key_are_in_order_adds() {
        let options = DbOptions::with_memory_env();
        let file = options
            .filesystem_provider()
            .create_file(Path::new("/siltdb/000002.sst"))
            .unwrap();
        let mut builder = TableBuilder::new(options, file);

        // Sequence numbers sort descending within a user key
        builder
            .add(&InternalKey::new(b"k".to_vec(), 9, Operation::Put).encode(), b"new")
            .unwrap();
        builder
            .add(&InternalKey::new(b"k".to_vec(), 3, Operation::Put).encode(), b"old")
            .unwrap();
        builder.finish().unwrap();

        assert_eq!(builder.num_entries(), 2);
        assert!(builder.file_size() > 0);
    }

    #[test]
    fn finished_files_end_with_a_footer() {
        let options = DbOptions::with_memory_env();
        let fs = options.filesystem_provider();
        let path = Path::new("/siltdb/000003.sst");
        let file = fs.create_file(path).unwrap();
        let mut builder = TableBuilder::new(options, file);

        for num in 0..100u64 {
            let key = InternalKey::new(format!("key{num:04}").into_bytes(), num, Operation::Put);
            builder.add(&key.encode(), b"some value").unwrap();
        }
        builder.finish().unwrap();

        let file_size = fs.get_file_size(path).unwrap();
        assert_eq!(file_size, builder.file_size());

        // The last 48 bytes decode as a footer
        let file = fs.open_random_access_file(path).unwrap();
        let mut footer_buf = vec![0; super::super::footer::FOOTER_LENGTH_BYTES];
        let footer_offset = file_size - footer_buf.len() as u64;
        file.read_at(&mut footer_buf, footer_offset).unwrap();
        assert!(Footer::decode(&footer_buf).is_ok());
    }
}
