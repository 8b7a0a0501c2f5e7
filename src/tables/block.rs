use integer_encoding::{FixedInt, VarInt};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::SIZE_OF_U32_BYTES;
use crate::comparator::Comparator;
use crate::errors::{SiltDbError, SiltDbResult};
use crate::iterator::SiltDbIterator;

/**
An immutable, sorted block of key-value entries as produced by
[`super::block_builder::BlockBuilder`].

The block validates its restart array up front but parses entries lazily: iterators hold a
cursor into the raw bytes and reconstruct prefix-compressed keys as they move. Key
comparisons go through the caller-provided comparator, so the same reader serves data blocks
(internal key order) and index or metaindex blocks (bytewise order).
*/
pub struct Block {
    /// The serialized block contents.
    data: Arc<Vec<u8>>,

    /// The offset in `data` where the restart point array begins.
    restart_offset: usize,

    /// The number of restart points in the block.
    num_restart_points: u32,
}

/// Public methods
impl Block {
    /// Construct a [`Block`] over serialized block contents, validating the restart array.
    pub fn new(data: Vec<u8>) -> SiltDbResult<Self> {
        if data.len() < SIZE_OF_U32_BYTES {
            return Err(SiltDbError::Corruption(
                "The block is too small to hold a restart array.".to_string(),
            ));
        }

        let num_restart_points = u32::decode_fixed(&data[data.len() - SIZE_OF_U32_BYTES..]);
        let max_restart_points =
            ((data.len() - SIZE_OF_U32_BYTES) / SIZE_OF_U32_BYTES) as u32;
        if num_restart_points == 0 || num_restart_points > max_restart_points {
            return Err(SiltDbError::Corruption(format!(
                "The block declares an impossible number of restart points ({}).",
                num_restart_points
            )));
        }

        let restart_offset =
            data.len() - (1 + num_restart_points as usize) * SIZE_OF_U32_BYTES;

        Ok(Self {
            data: Arc::new(data),
            restart_offset,
            num_restart_points,
        })
    }

    /// The size of the serialized block in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get an iterator over the block's entries, comparing keys with `comparator`.
    pub fn iter(&self, comparator: Arc<dyn Comparator>) -> BlockIter {
        BlockIter {
            data: Arc::clone(&self.data),
            comparator,
            restart_offset: self.restart_offset,
            num_restart_points: self.num_restart_points,
            current: self.restart_offset,
            restart_index: self.num_restart_points,
            key: vec![],
            value_offset: 0,
            value_length: 0,
            error: None,
        }
    }
}

/// A cursor over the entries of a [`Block`].
pub struct BlockIter {
    /// The serialized block contents, shared with the block.
    data: Arc<Vec<u8>>,

    /// The comparator defining the key order within the block.
    comparator: Arc<dyn Comparator>,

    /// The offset where the restart point array begins i.e. the end of entry data.
    restart_offset: usize,

    /// The number of restart points in the block.
    num_restart_points: u32,

    /**
    The offset of the current entry.

    Equals `restart_offset` when the cursor is invalid.
    */
    current: usize,

    /// The index of the restart point at or before the current entry.
    restart_index: u32,

    /// The reconstructed key of the current entry.
    key: Vec<u8>,

    /// The offset of the current entry's value.
    value_offset: usize,

    /// The length of the current entry's value.
    value_length: usize,

    /// The first corruption encountered while parsing, if any.
    error: Option<SiltDbError>,
}

/// Private methods
impl BlockIter {
    /// The offset just past the current entry i.e. where the next entry starts.
    fn next_entry_offset(&self) -> usize {
        self.value_offset + self.value_length
    }

    /// The byte offset stored in restart point `index`.
    fn restart_point(&self, index: u32) -> u32 {
        debug_assert!(index < self.num_restart_points);

        let position = self.restart_offset + (index as usize) * SIZE_OF_U32_BYTES;
        u32::decode_fixed(&self.data[position..position + SIZE_OF_U32_BYTES])
    }

    /// Position parsing state just before the entry at restart point `index`.
    fn seek_to_restart_point(&mut self, index: u32) {
        self.key.clear();
        self.restart_index = index;

        // Leave `current` untouched and park the value cursor so that the next
        // `parse_next_key` starts at the restart point.
        let offset = self.restart_point(index) as usize;
        self.value_offset = offset;
        self.value_length = 0;
    }

    /**
    Decode the entry header at `offset`.

    Returns the shared key length, the unshared key length, the value length, and the offset
    of the key suffix, or [`None`] if the header is malformed or out of bounds.
    */
    fn decode_entry(&self, offset: usize) -> Option<(usize, usize, usize, usize)> {
        let limit = self.restart_offset;
        if offset >= limit {
            return None;
        }
        let buf = &self.data[offset..limit];

        let (shared, shared_width) = u32::decode_var(buf)?;
        let (non_shared, non_shared_width) = u32::decode_var(&buf[shared_width..])?;
        let (value_length, value_width) =
            u32::decode_var(&buf[shared_width + non_shared_width..])?;

        let header_width = shared_width + non_shared_width + value_width;
        if header_width + (non_shared as usize) + (value_length as usize) > buf.len() {
            return None;
        }

        Some((
            shared as usize,
            non_shared as usize,
            value_length as usize,
            offset + header_width,
        ))
    }

    /// Mark the cursor invalid and remember the corruption.
    fn corruption_error(&mut self, reason: &str) {
        self.current = self.restart_offset;
        self.restart_index = self.num_restart_points;
        self.key.clear();
        self.value_offset = 0;
        self.value_length = 0;
        if self.error.is_none() {
            self.error = Some(SiltDbError::Corruption(reason.to_string()));
        }
    }

    /**
    Parse the entry after the current one, reconstructing its key.

    Returns false (leaving the cursor invalid) at the end of the block or on corruption.
    */
    fn parse_next_key(&mut self) -> bool {
        self.current = self.next_entry_offset();
        if self.current >= self.restart_offset {
            // No more entries. Mark invalid.
            self.current = self.restart_offset;
            self.restart_index = self.num_restart_points;
            return false;
        }

        match self.decode_entry(self.current) {
            None => {
                self.corruption_error("Failed to decode a block entry header.");
                false
            }
            Some((shared, non_shared, value_length, suffix_offset)) => {
                if shared > self.key.len() {
                    self.corruption_error(
                        "A block entry shares more key bytes than the previous key has.",
                    );
                    return false;
                }

                self.key.truncate(shared);
                self.key
                    .extend_from_slice(&self.data[suffix_offset..suffix_offset + non_shared]);
                self.value_offset = suffix_offset + non_shared;
                self.value_length = value_length;

                // Keep the restart index trailing the cursor for `prev`
                while self.restart_index + 1 < self.num_restart_points
                    && (self.restart_point(self.restart_index + 1) as usize) < self.current
                {
                    self.restart_index += 1;
                }

                true
            }
        }
    }

    /// Read the full key stored at restart point `index`. Restart entries share zero bytes.
    fn key_at_restart_point(&self, index: u32) -> Option<&[u8]> {
        let offset = self.restart_point(index) as usize;
        let (shared, non_shared, _, suffix_offset) = self.decode_entry(offset)?;
        if shared != 0 {
            return None;
        }

        Some(&self.data[suffix_offset..suffix_offset + non_shared])
    }
}

impl SiltDbIterator for BlockIter {
    fn is_valid(&self) -> bool {
        self.current < self.restart_offset
    }

    fn seek(&mut self, target: &[u8]) {
        // Binary search the restart points for the last one with a key before the target.
        // Restart entries store their keys in full, so no reconstruction is needed here.
        let mut left: u32 = 0;
        let mut right: u32 = self.num_restart_points - 1;
        while left < right {
            let mid = (left + right + 1) / 2;
            let mid_key = match self.key_at_restart_point(mid) {
                Some(key) => key,
                None => {
                    self.corruption_error("Failed to decode a restart point entry.");
                    return;
                }
            };

            if self.comparator.compare(mid_key, target) == Ordering::Less {
                // The key at `mid` is before the target, so every restart point before `mid`
                // is too.
                left = mid;
            } else {
                // The key at `mid` is at or past the target, so it cannot anchor the scan.
                right = mid - 1;
            }
        }

        // Scan forward from the chosen restart point to the first key at or past the target.
        self.seek_to_restart_point(left);
        loop {
            if !self.parse_next_key() {
                return;
            }

            if self.comparator.compare(&self.key, target) != Ordering::Less {
                return;
            }
        }
    }

    fn seek_to_first(&mut self) {
        self.seek_to_restart_point(0);
        self.parse_next_key();
    }

    fn seek_to_last(&mut self) {
        self.seek_to_restart_point(self.num_restart_points - 1);
        // Walk to the final entry of the block
        while self.parse_next_key() && self.next_entry_offset() < self.restart_offset {}
    }

    fn next(&mut self) {
        assert!(self.is_valid());

        self.parse_next_key();
    }

    fn prev(&mut self) {
        assert!(self.is_valid());

        // Find the restart point that precedes the current entry
        let original = self.current;
        while self.restart_point(self.restart_index) as usize >= original {
            if self.restart_index == 0 {
                // The cursor was at the first entry. Mark invalid.
                self.current = self.restart_offset;
                self.restart_index = self.num_restart_points;
                return;
            }

            self.restart_index -= 1;
        }

        // Scan forward until right before the original entry
        self.seek_to_restart_point(self.restart_index);
        while self.parse_next_key() && self.next_entry_offset() < original {}
    }

    fn key(&self) -> &[u8] {
        assert!(self.is_valid());

        &self.key
    }

    fn value(&self) -> &[u8] {
        assert!(self.is_valid());

        &self.data[self.value_offset..self.value_offset + self.value_length]
    }

    fn status(&mut self) -> SiltDbResult<()> {
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
