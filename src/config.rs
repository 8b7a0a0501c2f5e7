/*!
This module contains global configuration constants for SiltDB.

These values correspond to knobs that the storage engine keeps fixed. Values that callers are
expected to tune live on [`crate::DbOptions`] instead.
*/

use std::convert::TryFrom;

use crate::errors::{SiltDbError, SiltDbResult};

/// The size of a `u32` in bytes.
pub(crate) const SIZE_OF_U32_BYTES: usize = 4;

/// The size of a `u64` in bytes.
pub(crate) const SIZE_OF_U64_BYTES: usize = 8;

/**
The default approximate maximum size of user data packed into a block of a table file.

The data considered here is uncompressed data. The actual size of the block on disk may be
smaller due to compression.
*/
pub(crate) const DEFAULT_MAX_BLOCK_DATA_SIZE: usize = 4 * 1024;

/// The default number of keys between restart points when prefix compressing keys.
pub(crate) const DEFAULT_PREFIX_COMPRESSION_RESTART_INTERVAL: usize = 16;

/**
The compression types available for blocks within a table file.

The numeric values are part of the file format and are stored in the one byte block descriptor
that trails each block.
*/
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockCompressionType {
    /// No compression.
    None = 0,
    /// Snappy compression.
    Snappy = 1,
}

impl TryFrom<u8> for BlockCompressionType {
    type Error = SiltDbError;

    fn try_from(value: u8) -> SiltDbResult<BlockCompressionType> {
        let compression_type = match value {
            0 => BlockCompressionType::None,
            1 => BlockCompressionType::Snappy,
            _ => {
                return Err(SiltDbError::NotSupported(format!(
                    "Unknown block compression type. The value received was {}.",
                    value
                )))
            }
        };

        Ok(compression_type)
    }
}
