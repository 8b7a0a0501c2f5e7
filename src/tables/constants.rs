/// The size of the descriptor trailing every block: 1 byte of compression type and a 4 byte
/// masked checksum of the block contents and the compression type.
pub(crate) const BLOCK_DESCRIPTOR_SIZE_BYTES: usize = 1 + 4;

/// The key prefix under which a filter block is registered in the metaindex block.
pub(crate) const FILTER_META_KEY_PREFIX: &str = "filter.";
