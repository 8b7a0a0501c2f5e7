use std::cmp::Ordering;
use std::mem;
use std::sync::Arc;

use integer_encoding::{FixedInt, VarInt};

use crate::comparator::Comparator;
use crate::config::SIZE_OF_U32_BYTES;

/**
Builds table file blocks with prefix-compressed keys.

When a key is stored, the prefix it shares with the previous key is dropped and only the
suffix is written, which shrinks blocks of similar keys considerably. Every
`block_restart_interval` entries the compression restarts and a full key is stored; the
offsets of these restart points trail the block and anchor binary search.

# Serialization

Each entry is:

1. The number of key bytes shared with the previous key as a varint32
1. The number of unshared key bytes as a varint32
1. The value length as a varint32
1. The unshared key suffix
1. The value

followed at the end of the block by the restart point offsets as fixed-size `u32` values and
the number of restart points as a fixed-size `u32`.
*/
pub(crate) struct BlockBuilder {
    /// The number of keys between restart points.
    block_restart_interval: usize,

    /// The comparator used to check the ordering of added keys.
    comparator: Arc<dyn Comparator>,

    /// The serialized entries added so far.
    buffer: Vec<u8>,

    /// The offsets of the restart points within the block.
    restart_points: Vec<u32>,

    /// The number of entries added since the last restart point.
    entries_since_restart: usize,

    /// The last key that was added.
    last_key: Vec<u8>,

    /// True once [`BlockBuilder::finish`] was called and until the next reset.
    finished: bool,
}

/// Crate-only methods
impl BlockBuilder {
    /**
    Create a new [`BlockBuilder`].

    # Panics

    The restart interval must be at least 1.
    */
    pub(crate) fn new(block_restart_interval: usize, comparator: Arc<dyn Comparator>) -> Self {
        assert!(
            block_restart_interval >= 1,
            "Attempted to create a block builder with a restart interval of zero."
        );

        Self {
            block_restart_interval,
            comparator,
            buffer: vec![],
            // The first entry is always a restart point
            restart_points: vec![0],
            entries_since_restart: 0,
            last_key: vec![],
            finished: false,
        }
    }

    /**
    Add a key-value pair to the block.

    # Panics

    The builder must not be finished and `key` must sort after every previously added key.
    */
    pub(crate) fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(!self.finished, "Attempted to add to a finished block.");
        debug_assert!(self.entries_since_restart <= self.block_restart_interval);
        assert!(
            self.buffer.is_empty()
                || self.comparator.compare(key, &self.last_key) == Ordering::Greater,
            "Attempted to add a key that does not sort after the previous key."
        );

        let mut shared = 0;
        if self.entries_since_restart < self.block_restart_interval {
            // See how long a prefix the new key shares with the previous one
            let min_length = std::cmp::min(self.last_key.len(), key.len());
            while shared < min_length && self.last_key[shared] == key[shared] {
                shared += 1;
            }
        } else {
            // Restart prefix compression with a full key
            self.restart_points.push(self.buffer.len() as u32);
            self.entries_since_restart = 0;
        }

        let non_shared = key.len() - shared;
        self.buffer.extend(u32::encode_var_vec(shared as u32));
        self.buffer.extend(u32::encode_var_vec(non_shared as u32));
        self.buffer.extend(u32::encode_var_vec(value.len() as u32));
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        debug_assert!(self.last_key == key);

        self.entries_since_restart += 1;
    }

    /// Append the restart point array and return the serialized block.
    pub(crate) fn finish(&mut self) -> Vec<u8> {
        for restart_point in &self.restart_points {
            self.buffer.extend(u32::encode_fixed_vec(*restart_point));
        }
        self.buffer
            .extend(u32::encode_fixed_vec(self.restart_points.len() as u32));
        self.finished = true;

        mem::take(&mut self.buffer)
    }

    /// Reset the builder to its initial state, keeping its configuration.
    pub(crate) fn reset(&mut self) {
        self.buffer.clear();
        self.restart_points.clear();
        self.restart_points.push(0);
        self.entries_since_restart = 0;
        self.last_key.clear();
        self.finished = false;
    }

    /// The size the serialized block would have if finished now.
    pub(crate) fn current_size_estimate(&self) -> usize {
        self.buffer.len()
            + self.restart_points.len() * SIZE_OF_U32_BYTES
            + SIZE_OF_U32_BYTES
    }

    /// Returns true if no entries have been added since creation or the last reset.
    pub(crate) fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
