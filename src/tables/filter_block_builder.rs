use integer_encoding::FixedInt;
use std::sync::Arc;

use crate::filter_policy::FilterPolicy;

/**
The base-2 logarithm of the byte range covered by one filter.

The current range size is 2 KiB. The value is stored in the filter block so that readers keep
working if the range ever changes.
*/
pub(crate) const FILTER_BASE_LG: u8 = 11;

/// The byte range covered by one filter.
pub(crate) const FILTER_BASE_BYTES: u64 = 1 << FILTER_BASE_LG;

/**
Builds the filter block for a table.

One filter is generated per 2 KiB region of data block bytes, so a filter can cover several
small blocks or one slice of a large block. Filters are generated eagerly as the table builder
crosses region boundaries.

Callers drive the builder in the following pattern, where `start_block` is invoked with the
file offset each time a new data block begins: `(start_block add_key*)* finish`.

# Serialization

1. The filter payloads back to back
1. One fixed-size `u32` offset per filter, locating it within the payload region
1. The offset of the offset array itself as a fixed-size `u32`
1. One byte holding the base-2 logarithm of the region size
*/
pub(crate) struct FilterBlockBuilder {
    /// The filter policy used to generate filter payloads.
    filter_policy: Arc<dyn FilterPolicy>,

    /// The keys accumulated for the current region, flattened back to back.
    keys: Vec<u8>,

    /// The start offset in `keys` of each accumulated key.
    starts: Vec<usize>,

    /// The filter payloads generated so far.
    result: Vec<u8>,

    /// The offset in `result` of each generated filter.
    filter_offsets: Vec<u32>,
}

/// Crate-only methods
impl FilterBlockBuilder {
    /// Create a new [`FilterBlockBuilder`].
    pub(crate) fn new(filter_policy: Arc<dyn FilterPolicy>) -> Self {
        Self {
            filter_policy,
            keys: vec![],
            starts: vec![],
            result: vec![],
            filter_offsets: vec![],
        }
    }

    /**
    Notify the builder that a data block is being written at `block_offset`.

    Generates filters for every region boundary crossed since the previous data block. A
    region with no keys produces an empty filter entry that shares its offset with the next
    filter.
    */
    pub(crate) fn start_block(&mut self, block_offset: u64) {
        let filter_index = block_offset / FILTER_BASE_BYTES;
        debug_assert!(filter_index >= self.filter_offsets.len() as u64);

        while filter_index > self.filter_offsets.len() as u64 {
            self.generate_filter();
        }
    }

    /// Add a key to the filter for the current region.
    pub(crate) fn add_key(&mut self, key: &[u8]) {
        self.starts.push(self.keys.len());
        self.keys.extend_from_slice(key);
    }

    /// Generate any pending filter and return the serialized filter block.
    pub(crate) fn finish(&mut self) -> Vec<u8> {
        if !self.starts.is_empty() {
            self.generate_filter();
        }

        let offsets_array_offset = self.result.len() as u32;
        for offset in &self.filter_offsets {
            self.result.extend(u32::encode_fixed_vec(*offset));
        }
        self.result
            .extend(u32::encode_fixed_vec(offsets_array_offset));
        self.result.push(FILTER_BASE_LG);

        std::mem::take(&mut self.result)
    }
}

/// Private methods
impl FilterBlockBuilder {
    /// Turn the accumulated keys into one filter payload.
    fn generate_filter(&mut self) {
        let num_keys = self.starts.len();
        self.filter_offsets.push(self.result.len() as u32);
        if num_keys == 0 {
            // An empty region. Its offset entry simply points at the next filter.
            return;
        }

        // Mark the end of the last key to simplify the slicing below
        self.starts.push(self.keys.len());
        let key_slices: Vec<&[u8]> = (0..num_keys)
            .map(|idx| &self.keys[self.starts[idx]..self.starts[idx + 1]])
            .collect();

        let filter = self.filter_policy.create_filter(&key_slices);
        self.result.extend(filter);

        self.keys.clear();
        self.starts.clear();
    }
}
