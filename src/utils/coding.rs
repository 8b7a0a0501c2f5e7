/*!
Helpers for length-prefixed framing of byte strings.

Fixed-width and varint integer codecs come from the `integer-encoding` crate. The helpers here
layer the one framing convention the rest of the crate shares on top of those codecs: a byte
string preceded by its varint32 encoded length.
*/

use integer_encoding::VarInt;

/// Append `value` to `buf` as a varint32 length followed by the bytes themselves.
pub(crate) fn append_length_prefixed_slice(buf: &mut Vec<u8>, value: &[u8]) {
    buf.extend(u32::encode_var_vec(value.len() as u32));
    buf.extend_from_slice(value);
}

/**
Decode a length-prefixed byte string from the front of `buf`.

Returns the decoded slice and the total number of bytes consumed (prefix included), or [`None`]
if the buffer is truncated or the prefix is malformed.
*/
pub(crate) fn decode_length_prefixed_slice(buf: &[u8]) -> Option<(&[u8], usize)> {
    let (length, prefix_size) = u32::decode_var(buf)?;
    let end = prefix_size.checked_add(length as usize)?;
    if end > buf.len() {
        return None;
    }

    Some((&buf[prefix_size..end], end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn length_prefixed_slices_can_be_round_tripped() {
        let mut buf = vec![];
        append_length_prefixed_slice(&mut buf, b"foo");
        append_length_prefixed_slice(&mut buf, b"");
        append_length_prefixed_slice(&mut buf, &[0xff; 300]);

        let (first, consumed) = decode_length_prefixed_slice(&buf).unwrap();
        assert_eq!(first, b"foo");

        let (second, consumed_empty) = decode_length_prefixed_slice(&buf[consumed..]).unwrap();
        assert_eq!(second, b"");

        let (third, _) = decode_length_prefixed_slice(&buf[consumed + consumed_empty..]).unwrap();
        assert_eq!(third, &[0xff; 300]);
    }

    #[test]
    fn truncated_buffers_do_not_decode() {
        let mut buf = vec![];
        append_length_prefixed_slice(&mut buf, b"truncate me");
        buf.truncate(buf.len() - 1);

        assert!(decode_length_prefixed_slice(&buf).is_none());
    }
}
