/*!
Checksum utilities shared by the write-ahead log and the table file format.

Checksums are CRC32C (iSCSI polynomial) and are stored masked. Computing the CRC of a byte
string that itself embeds CRCs can be problematic, so any checksum destined for storage is
rotated and offset by a constant first. The mask constant is part of the file format and must
match between writers and readers.
*/

use crc::{Crc, CRC_32_ISCSI};

/// CRC calculator using the iSCSI polynomial.
pub(crate) const CRC_CALCULATOR: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// A constant delta for masking and unmasking checksums.
const CRC_MASKING_DELTA: u32 = 0xa282_ead8;

/// Compute the masked CRC32C of `parts` treated as one concatenated byte string.
pub(crate) fn masked_crc(parts: &[&[u8]]) -> u32 {
    let mut digest = CRC_CALCULATOR.digest();
    for part in parts {
        digest.update(part);
    }

    mask_checksum(digest.finalize())
}

/// Return a masked representation of the checksum. Rotate right by 15 bits and add a constant.
pub(crate) fn mask_checksum(checksum: u32) -> u32 {
    (checksum.wrapping_shr(15) | checksum.wrapping_shl(17)).wrapping_add(CRC_MASKING_DELTA)
}

/**
Return the unmasked checksum.

The checksum must have been masked with [`mask_checksum`].
*/
pub(crate) fn unmask_checksum(masked_checksum: u32) -> u32 {
    let rotated = masked_checksum.wrapping_sub(CRC_MASKING_DELTA);
    rotated.wrapping_shr(17) | rotated.wrapping_shl(15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn can_mask_and_unmask_checksums_correctly() {
        let checksum = CRC_CALCULATOR.checksum(b"foo");

        assert_ne!(checksum, mask_checksum(checksum));
        assert_ne!(checksum, mask_checksum(mask_checksum(checksum)));
        assert_eq!(checksum, unmask_checksum(mask_checksum(checksum)));
    }

    #[test]
    fn masked_crc_over_parts_matches_masked_crc_over_concatenation() {
        let concatenated = CRC_CALCULATOR.checksum(b"helloworld");

        assert_eq!(mask_checksum(concatenated), masked_crc(&[b"hello", b"world"]));
        assert_eq!(mask_checksum(concatenated), masked_crc(&[b"helloworld"]));
    }
}
