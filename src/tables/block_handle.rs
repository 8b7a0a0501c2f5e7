use integer_encoding::VarInt;

use crate::errors::{SiltDbError, SiltDbResult};

/**
The maximum encoded size of a [`BlockHandle`].

Each varint64 occupies at most 10 bytes.
*/
pub(crate) const BLOCK_HANDLE_MAX_ENCODED_LENGTH_BYTES: usize = 10 + 10;

/**
A block handle locates a block within its file: two varint64 values holding the block's offset
and its size.

The size counts only the block contents, not the 5 byte descriptor that trails every block on
disk.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct BlockHandle {
    /// The offset of the block in the file.
    offset: u64,

    /// The size of the block contents.
    size: u64,
}

/// Crate-only methods
impl BlockHandle {
    /// Create a new [`BlockHandle`].
    pub(crate) fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Get the offset of the block this handle is for.
    pub(crate) fn get_offset(&self) -> u64 {
        self.offset
    }

    /// Get the size of the block this handle is for.
    pub(crate) fn get_size(&self) -> u64 {
        self.size
    }

    /// Serialize the handle.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(BLOCK_HANDLE_MAX_ENCODED_LENGTH_BYTES);
        buf.extend(self.offset.encode_var_vec());
        buf.extend(self.size.encode_var_vec());

        buf
    }

    /**
    Deserialize a handle from the front of `buf`.

    Returns the handle and the number of bytes it occupied.
    */
    pub(crate) fn decode(buf: &[u8]) -> SiltDbResult<(BlockHandle, usize)> {
        let (offset, offset_length) = u64::decode_var(buf).ok_or_else(|| {
            SiltDbError::Corruption("Failed to decode a block handle's offset.".to_string())
        })?;
        let (size, size_length) = u64::decode_var(&buf[offset_length..]).ok_or_else(|| {
            SiltDbError::Corruption("Failed to decode a block handle's size.".to_string())
        })?;

        Ok((BlockHandle::new(offset, size), offset_length + size_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn handles_round_trip_through_their_encoding() {
        for (offset, size) in [(0, 0), (1, 127), (128, 16_384), (u64::MAX, u64::MAX)] {
            let handle = BlockHandle::new(offset, size);
            let encoded = handle.encode();
            assert!(encoded.len() <= BLOCK_HANDLE_MAX_ENCODED_LENGTH_BYTES);

            let (decoded, bytes_read) = BlockHandle::decode(&encoded).unwrap();
            assert_eq!(decoded, handle);
            assert_eq!(bytes_read, encoded.len());
        }
    }

    #[test]
    fn truncated_handles_are_corrupt() {
        let encoded = BlockHandle::new(u64::MAX, 12).encode();

        assert!(BlockHandle::decode(&encoded[..encoded.len() - 1]).is_err());
        assert!(BlockHandle::decode(&[]).is_err());
    }
}
