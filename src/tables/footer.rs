use integer_encoding::FixedInt;

use crate::errors::{SiltDbError, SiltDbResult};

use super::block_handle::BlockHandle;

/// The fixed size of a serialized footer.
pub(crate) const FOOTER_LENGTH_BYTES: usize = 48;

/// The magic number closing every table file, stored little-endian in the last 8 bytes.
const TABLE_MAGIC_NUMBER: u64 = 0xdb47_7524_8b80_fb57;

/**
The footer of a table file.

# Serialization

1. The block handle of the metaindex block
1. The block handle of the index block
1. Zero padding up to 40 bytes, so the footer stays fixed-length despite the handles'
   variable-length encoding
1. The 8-byte magic number
*/
#[derive(Debug)]
pub(crate) struct Footer {
    /// Handle to the metaindex block.
    metaindex_handle: BlockHandle,

    /// Handle to the index block.
    index_handle: BlockHandle,
}

/// Crate-only methods
impl Footer {
    /// Create a new [`Footer`].
    pub(crate) fn new(metaindex_handle: BlockHandle, index_handle: BlockHandle) -> Self {
        Self {
            metaindex_handle,
            index_handle,
        }
    }

    /// Get the handle to the metaindex block.
    pub(crate) fn get_metaindex_handle(&self) -> &BlockHandle {
        &self.metaindex_handle
    }

    /// Get the handle to the index block.
    pub(crate) fn get_index_handle(&self) -> &BlockHandle {
        &self.index_handle
    }

    /// Serialize the footer to its fixed 48-byte form.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FOOTER_LENGTH_BYTES);
        buf.extend(self.metaindex_handle.encode());
        buf.extend(self.index_handle.encode());
        buf.resize(FOOTER_LENGTH_BYTES - 8, 0);
        buf.extend(u64::encode_fixed_vec(TABLE_MAGIC_NUMBER));

        debug_assert_eq!(buf.len(), FOOTER_LENGTH_BYTES);
        buf
    }

    /// Deserialize a footer, validating the magic number.
    pub(crate) fn decode(buf: &[u8]) -> SiltDbResult<Footer> {
        if buf.len() != FOOTER_LENGTH_BYTES {
            return Err(SiltDbError::Corruption(format!(
                "A table footer must be exactly {} bytes but the buffer was {} bytes.",
                FOOTER_LENGTH_BYTES,
                buf.len()
            )));
        }

        let magic_number = u64::decode_fixed(&buf[FOOTER_LENGTH_BYTES - 8..]);
        if magic_number != TABLE_MAGIC_NUMBER {
            return Err(SiltDbError::Corruption(
                "Bad footer magic number. This is not a table file.".to_string(),
            ));
        }

        let (metaindex_handle, bytes_read) = BlockHandle::decode(buf)?;
        let (index_handle, _) = BlockHandle::decode(&buf[bytes_read..])?;

        Ok(Footer::new(metaindex_handle, index_handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn footers_round_trip_through_their_encoding() {
        let footer = Footer::new(BlockHandle::new(4_096, 512), BlockHandle::new(8_192, 1_024));
        let encoded = footer.encode();
        assert_eq!(encoded.len(), FOOTER_LENGTH_BYTES);

        let decoded = Footer::decode(&encoded).unwrap();
        assert_eq!(decoded.get_metaindex_handle(), footer.get_metaindex_handle());
        assert_eq!(decoded.get_index_handle(), footer.get_index_handle());
    }

    #[test]
    fn a_bad_magic_number_is_corruption() {
        let mut encoded =
            Footer::new(BlockHandle::new(0, 0), BlockHandle::new(0, 0)).encode();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;

        assert!(Footer::decode(&encoded).is_err());
    }

    #[test]
    fn a_wrongly_sized_buffer_is_corruption() {
        let encoded = Footer::new(BlockHandle::new(0, 0), BlockHandle::new(0, 0)).encode();

        assert!(Footer::decode(&encoded[1..]).is_err());
    }
}
