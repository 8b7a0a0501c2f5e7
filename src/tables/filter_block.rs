use integer_encoding::FixedInt;
use std::sync::Arc;

use crate::config::SIZE_OF_U32_BYTES;
use crate::filter_policy::FilterPolicy;

/**
A reader for the filter block of a table.

The reader is deliberately forgiving: filters exist only to avoid unnecessary block reads, so
any malformed or out-of-range state answers "may match" and the read proceeds to the block
itself. An empty filter entry, by contrast, proves its region held no keys and answers a
definite no.
*/
pub(crate) struct FilterBlockReader {
    /// The filter policy used to check keys against filter payloads.
    filter_policy: Arc<dyn FilterPolicy>,

    /// The serialized filter block.
    data: Vec<u8>,

    /// The offset in `data` where the filter offset array begins.
    offsets_start: usize,

    /// The number of filters in the block.
    num_filters: usize,

    /// The base-2 logarithm of the byte range covered by one filter.
    base_lg: u8,
}

/// Crate-only methods
impl FilterBlockReader {
    /**
    Create a new [`FilterBlockReader`] over serialized filter block contents.

    Malformed contents produce a reader with zero filters, which conservatively answers
    "may match" for every key.
    */
    pub(crate) fn new(filter_policy: Arc<dyn FilterPolicy>, data: Vec<u8>) -> Self {
        let mut reader = Self {
            filter_policy,
            data,
            offsets_start: 0,
            num_filters: 0,
            base_lg: 0,
        };

        // The trailer is 1 byte of base log plus 4 bytes locating the offset array
        if reader.data.len() < 1 + SIZE_OF_U32_BYTES {
            return reader;
        }

        let trailer_start = reader.data.len() - 1 - SIZE_OF_U32_BYTES;
        reader.base_lg = reader.data[reader.data.len() - 1];
        let offsets_start =
            u32::decode_fixed(&reader.data[trailer_start..trailer_start + SIZE_OF_U32_BYTES])
                as usize;
        if offsets_start > trailer_start {
            return reader;
        }

        reader.offsets_start = offsets_start;
        reader.num_filters = (trailer_start - offsets_start) / SIZE_OF_U32_BYTES;

        reader
    }

    /**
    Returns true if the key may be present in the data block starting at `block_offset`.

    Returns false only when the filter covering that region proves the key absent.
    */
    pub(crate) fn key_may_match(&self, block_offset: u64, key: &[u8]) -> bool {
        let filter_index = (block_offset >> self.base_lg) as usize;
        if filter_index >= self.num_filters {
            // Out of range. Err on the side of a disk read.
            return true;
        }

        let start = self.filter_offset(filter_index);
        // The offset array is followed by its own start offset, so the entry past the last
        // filter offset is exactly the end of the payload region.
        let limit = self.filter_offset(filter_index + 1);

        if start == limit {
            // An empty filter covers no keys at all
            return false;
        }

        if start < limit && limit <= self.offsets_start {
            let filter = &self.data[start..limit];
            return self.filter_policy.key_may_match(key, filter);
        }

        // The offsets are inconsistent. Err on the side of a disk read.
        log::warn!(
            "Inconsistent filter offsets at index {} (start {}, limit {}). Forcing a block read.",
            filter_index,
            start,
            limit
        );
        true
    }
}

/// Private methods
impl FilterBlockReader {
    /// Read entry `index` of the filter offset array.
    fn filter_offset(&self, index: usize) -> usize {
        let position = self.offsets_start + index * SIZE_OF_U32_BYTES;
        u32::decode_fixed(&self.data[position..position + SIZE_OF_U32_BYTES]) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::super::filter_block_builder::{FilterBlockBuilder, FILTER_BASE_BYTES};
    use super::*;
    use crate::filter_policy::BloomFilterPolicy;

    fn bloom() -> Arc<dyn FilterPolicy> {
        Arc::new(BloomFilterPolicy::new(10))
    }

    #[test]
    fn an_empty_filter_block_matches_everything() {
        let mut builder = FilterBlockBuilder::new(bloom());
        let reader = FilterBlockReader::new(bloom(), builder.finish());

        // Zero filters means every probe is out of range and conservatively matches
        assert!(reader.key_may_match(0, b"foo"));
        assert!(reader.key_may_match(100_000, b"foo"));
    }

    #[test]
    fn built_keys_are_never_false_negatives() {
        let mut builder = FilterBlockBuilder::new(bloom());
        builder.start_block(0);
        let keys: Vec<Vec<u8>> = (1..=1_000u32)
            .map(|num| format!("a{num}").into_bytes())
            .collect();
        for key in &keys {
            builder.add_key(key);
        }
        let reader = FilterBlockReader::new(bloom(), builder.finish());

        for key in &keys {
            assert!(reader.key_may_match(0, key));
        }
        // Every offset within the first region consults the same filter
        assert!(reader.key_may_match(FILTER_BASE_BYTES - 1, &keys[0]));
    }

    #[test]
    fn absent_keys_usually_miss() {
        let mut builder = FilterBlockBuilder::new(bloom());
        builder.start_block(0);
        for num in 1..=1_000u32 {
            builder.add_key(format!("a{num}").as_bytes());
        }
        let reader = FilterBlockReader::new(bloom(), builder.finish());

        let mut false_positives = 0;
        for num in 0..1_000 {
            if reader.key_may_match(0, format!("zz{num}").as_bytes()) {
                false_positives += 1;
            }
        }
        assert!(false_positives < 40, "Too many false positives: {false_positives}");
    }

    #[test]
    fn filters_apply_per_region() {
        let mut builder = FilterBlockBuilder::new(bloom());
        builder.start_block(0);
        builder.add_key(b"first-region");
        builder.start_block(3 * FILTER_BASE_BYTES);
        builder.add_key(b"fourth-region");
        let reader = FilterBlockReader::new(bloom(), builder.finish());

        assert!(reader.key_may_match(0, b"first-region"));
        assert!(reader.key_may_match(3 * FILTER_BASE_BYTES, b"fourth-region"));

        // The key is in region zero's filter only
        assert!(!reader.key_may_match(3 * FILTER_BASE_BYTES, b"first-region"));
        // The empty regions in between match nothing
        assert!(!reader.key_may_match(FILTER_BASE_BYTES, b"first-region"));
        assert!(!reader.key_may_match(2 * FILTER_BASE_BYTES, b"anything"));
    }

    #[test]
    fn malformed_filter_blocks_match_conservatively() {
        let reader = FilterBlockReader::new(bloom(), vec![1, 2, 3]);
        assert!(reader.key_may_match(0, b"foo"));

        // An offset array start pointing past the trailer
        let mut data = vec![];
        data.extend(u32::encode_fixed_vec(1_000));
        data.push(11);
        let reader = FilterBlockReader::new(bloom(), data);
        assert!(reader.key_may_match(0, b"foo"));
    }
}
