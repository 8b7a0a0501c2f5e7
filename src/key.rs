/*!
Entries in the database are represented by an internal key that adds additional metadata to the
user provided key: a sequence number and the operation that was performed.

The sequence number is a global, monotonically increasing 56-bit unsigned int. It is never
reset. Because writes are append-only, there may be multiple stored versions for the same user
key. The sequence number denotes which of the stored versions is the most recent.

# Serialization

An internal key is the user key followed by an 8-byte trailer that packs the sequence number
and the operation as `(sequence << 8) | operation`, encoded little-endian. Sorting internal
keys with [`InternalKeyComparator`] groups versions of the same user key together with the
newest version first.
*/

use integer_encoding::{FixedInt, VarInt};
use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;

use crate::comparator::Comparator;
use crate::errors::{SiltDbError, SiltDbResult};

/// The length in bytes of the packed sequence number and operation trailer.
pub(crate) const INTERNAL_KEY_TRAILER_LENGTH_BYTES: usize = 8;

/**
The maximum sequence number.

Sequence numbers are stored in the upper 56 bits of the internal key trailer, leaving the low
byte for the operation tag.
*/
pub const MAX_SEQUENCE_NUMBER: u64 = (1 << 56) - 1;

/// The operation that is being applied to an entry in the database.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    /// This represents a tombstone. There is no value set for the operation.
    Delete = 0,
    /// Add a new key-value pair or update an existing key-value pair.
    Put = 1,
}

impl TryFrom<u8> for Operation {
    type Error = SiltDbError;

    fn try_from(value: u8) -> SiltDbResult<Operation> {
        match value {
            0 => Ok(Operation::Delete),
            1 => Ok(Operation::Put),
            _ => Err(SiltDbError::Corruption(format!(
                "Invalid operation tag in an internal key trailer. The value received was {}.",
                value
            ))),
        }
    }
}

/**
The operation tag used when building keys for seeking.

`Put` has the numerically largest tag, and trailers sort in descending numeric order, so a
seek key built with this tag positions at or before every entry with the same user key and
sequence number.
*/
pub(crate) const OPERATION_FOR_SEEKING: Operation = Operation::Put;

/// Pack a sequence number and operation into the 64-bit trailer representation.
pub(crate) fn pack_sequence_and_operation(sequence_number: u64, operation: Operation) -> u64 {
    debug_assert!(sequence_number <= MAX_SEQUENCE_NUMBER);

    (sequence_number << 8) | (operation as u64)
}

/// Append the serialized internal key for `(user_key, sequence_number, operation)` to `buf`.
pub(crate) fn append_internal_key(
    buf: &mut Vec<u8>,
    user_key: &[u8],
    sequence_number: u64,
    operation: Operation,
) {
    buf.extend_from_slice(user_key);
    buf.extend(u64::encode_fixed_vec(pack_sequence_and_operation(
        sequence_number,
        operation,
    )));
}

/**
Extract the user key portion of a serialized internal key.

# Panics

The buffer must be at least as long as the trailer.
*/
pub(crate) fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    assert!(internal_key.len() >= INTERNAL_KEY_TRAILER_LENGTH_BYTES);

    &internal_key[..internal_key.len() - INTERNAL_KEY_TRAILER_LENGTH_BYTES]
}

/// Extract the packed trailer of a serialized internal key.
pub(crate) fn extract_trailer(internal_key: &[u8]) -> u64 {
    assert!(internal_key.len() >= INTERNAL_KEY_TRAILER_LENGTH_BYTES);

    u64::decode_fixed(&internal_key[internal_key.len() - INTERNAL_KEY_TRAILER_LENGTH_BYTES..])
}

/**
Parse a serialized internal key into its parts.

Returns a [`SiltDbError::Corruption`] if the buffer is shorter than a trailer or if the
operation tag is not a known operation.
*/
pub(crate) fn parse_internal_key(internal_key: &[u8]) -> SiltDbResult<(&[u8], u64, Operation)> {
    if internal_key.len() < INTERNAL_KEY_TRAILER_LENGTH_BYTES {
        return Err(SiltDbError::Corruption(format!(
            "An internal key must be at least {} bytes but the buffer was {} bytes.",
            INTERNAL_KEY_TRAILER_LENGTH_BYTES,
            internal_key.len()
        )));
    }

    let trailer = extract_trailer(internal_key);
    let operation = Operation::try_from((trailer & 0xff) as u8)?;
    let sequence_number = trailer >> 8;

    Ok((extract_user_key(internal_key), sequence_number, operation))
}

/**
This is the actual key used internally by SiltDB. It is the user provided key with additional
metadata.
*/
#[derive(Clone, Eq, PartialEq)]
pub struct InternalKey {
    /// The user supplied key.
    user_key: Vec<u8>,

    /// The sequence number of the operation associated with this key.
    sequence_number: u64,

    /// The operation being performed with this key.
    operation: Operation,
}

/// Public methods
impl InternalKey {
    /// Construct a new [`InternalKey`].
    pub fn new(user_key: Vec<u8>, sequence_number: u64, operation: Operation) -> Self {
        Self {
            user_key,
            sequence_number,
            operation,
        }
    }

    /**
    Construct an [`InternalKey`] suitable for seeking the newest version of `user_key` that is
    visible at `sequence_number`.
    */
    pub fn new_for_seeking(user_key: Vec<u8>, sequence_number: u64) -> Self {
        Self::new(user_key, sequence_number, OPERATION_FOR_SEEKING)
    }

    /// Return the user key.
    pub fn get_user_key(&self) -> &[u8] {
        &self.user_key
    }

    /// Return the sequence number.
    pub fn get_sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Return the operation.
    pub fn get_operation(&self) -> Operation {
        self.operation
    }

    /// Serialize the key to its on-disk representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(self.user_key.len() + INTERNAL_KEY_TRAILER_LENGTH_BYTES);
        append_internal_key(&mut buf, &self.user_key, self.sequence_number, self.operation);

        buf
    }

    /// Deserialize an internal key from its on-disk representation.
    pub fn decode(buf: &[u8]) -> SiltDbResult<Self> {
        let (user_key, sequence_number, operation) = parse_internal_key(buf)?;

        Ok(Self::new(user_key.to_vec(), sequence_number, operation))
    }
}

impl fmt::Debug for InternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalKey")
            .field("user_key", &String::from_utf8_lossy(&self.user_key))
            .field("sequence_number", &self.sequence_number)
            .field("operation", &self.operation)
            .finish()
    }
}

/**
A comparator for serialized internal keys.

Ordering is ascending by user key (per the wrapped user comparator) and, on user-key ties,
descending by the packed trailer so that newer versions of a user key sort first.
*/
#[derive(Clone)]
pub struct InternalKeyComparator {
    /// The comparator that orders the user key portions.
    user_comparator: Arc<dyn Comparator>,
}

/// Public methods
impl InternalKeyComparator {
    /// Construct a new [`InternalKeyComparator`] wrapping the provided user comparator.
    pub fn new(user_comparator: Arc<dyn Comparator>) -> Self {
        Self { user_comparator }
    }

    /// Get a strong reference to the wrapped user comparator.
    pub fn user_comparator(&self) -> Arc<dyn Comparator> {
        Arc::clone(&self.user_comparator)
    }
}

impl Comparator for InternalKeyComparator {
    fn name(&self) -> &str {
        "siltdb.InternalKeyComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let user_key_ordering = self
            .user_comparator
            .compare(extract_user_key(a), extract_user_key(b));
        if user_key_ordering != Ordering::Equal {
            return user_key_ordering;
        }

        // Trailers order descending so that the newest version of a user key sorts first
        extract_trailer(b).cmp(&extract_trailer(a))
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        // Attempt to shorten the user key portion of the key
        let user_start = extract_user_key(start);
        let user_limit = extract_user_key(limit);
        let mut shortened = user_start.to_vec();
        self.user_comparator
            .find_shortest_separator(&mut shortened, user_limit);

        if shortened.len() < user_start.len()
            && self
                .user_comparator
                .compare(user_start, &shortened)
                .is_lt()
        {
            // A physically shorter user key was found. Tack on the largest possible trailer so
            // the separator sorts before every real version of that user key.
            append_internal_key(
                &mut shortened,
                &[],
                MAX_SEQUENCE_NUMBER,
                OPERATION_FOR_SEEKING,
            );
            debug_assert!(self.compare(start, &shortened).is_lt());
            debug_assert!(self.compare(&shortened, limit).is_lt());

            *start = shortened;
        }
    }

    fn find_short_successor(&self, key: &mut Vec<u8>) {
        let user_key = extract_user_key(key);
        let mut successor = user_key.to_vec();
        self.user_comparator.find_short_successor(&mut successor);

        if successor.len() < user_key.len()
            && self.user_comparator.compare(user_key, &successor).is_lt()
        {
            append_internal_key(
                &mut successor,
                &[],
                MAX_SEQUENCE_NUMBER,
                OPERATION_FOR_SEEKING,
            );
            debug_assert!(self.compare(key, &successor).is_lt());

            *key = successor;
        }
    }
}

/**
A key used for point lookups. The key is built once per lookup and exposes three overlapping
views of one buffer:

1. The memtable key: a varint32 length prefix followed by the internal key. This is the format
   entries are stored under in the memtable.
1. The internal key: the user key plus the metadata trailer.
1. The user key alone.

The views are offset pairs into the single backing buffer rather than independent copies.
*/
pub struct LookupKey {
    /// The backing buffer holding the serialized memtable key.
    data: Vec<u8>,

    /// The offset in `data` where the internal key begins i.e. just past the length prefix.
    internal_key_offset: usize,
}

/// Public methods
impl LookupKey {
    /// Construct a new [`LookupKey`] for looking up `user_key` at `sequence_number`.
    pub fn new(user_key: Vec<u8>, sequence_number: u64) -> Self {
        let internal_key_length = user_key.len() + INTERNAL_KEY_TRAILER_LENGTH_BYTES;
        let mut data =
            Vec::with_capacity(internal_key_length + SIZE_OF_MAX_VARINT32_BYTES);
        data.extend(u32::encode_var_vec(internal_key_length as u32));
        let internal_key_offset = data.len();
        append_internal_key(
            &mut data,
            &user_key,
            sequence_number,
            OPERATION_FOR_SEEKING,
        );

        Self {
            data,
            internal_key_offset,
        }
    }

    /// The key in the format stored by the memtable.
    pub fn memtable_key(&self) -> &[u8] {
        &self.data
    }

    /// The internal key view.
    pub fn internal_key(&self) -> &[u8] {
        &self.data[self.internal_key_offset..]
    }

    /// The user key view.
    pub fn user_key(&self) -> &[u8] {
        &self.data[self.internal_key_offset
            ..self.data.len() - INTERNAL_KEY_TRAILER_LENGTH_BYTES]
    }

    /// The sequence number this lookup reads at.
    pub fn sequence_number(&self) -> u64 {
        extract_trailer(self.internal_key()) >> 8
    }
}

/// The maximum number of bytes a varint32 can occupy.
const SIZE_OF_MAX_VARINT32_BYTES: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;
    use pretty_assertions::assert_eq;

    #[test]
    fn internal_keys_round_trip_through_their_encoding() {
        let cases: Vec<(&[u8], u64, Operation)> = vec![
            (b"foo", 100, Operation::Put),
            (b"bar", 3, Operation::Delete),
            (b"k", MAX_SEQUENCE_NUMBER, Operation::Put),
            (b"\x00\xff", 0, Operation::Delete),
        ];

        for (user_key, sequence_number, operation) in cases {
            let key = InternalKey::new(user_key.to_vec(), sequence_number, operation);
            let encoded = key.encode();

            assert_eq!(extract_user_key(&encoded), user_key);
            let decoded = InternalKey::decode(&encoded).unwrap();
            assert_eq!(decoded.get_user_key(), user_key);
            assert_eq!(decoded.get_sequence_number(), sequence_number);
            assert_eq!(decoded.get_operation(), operation);
        }
    }

    #[test]
    fn keys_shorter_than_a_trailer_are_corrupt() {
        assert!(parse_internal_key(b"short").is_err());
        assert!(parse_internal_key(b"").is_err());
    }

    #[test]
    fn keys_with_an_unknown_operation_tag_are_corrupt() {
        let mut encoded = InternalKey::new(b"foo".to_vec(), 7, Operation::Put).encode();
        let trailer_start = encoded.len() - INTERNAL_KEY_TRAILER_LENGTH_BYTES;
        encoded[trailer_start] = 0x7f;

        assert!(parse_internal_key(&encoded).is_err());
    }

    #[test]
    fn internal_key_ordering_is_user_key_ascending_then_sequence_descending() {
        let comparator = InternalKeyComparator::new(Arc::new(BytewiseComparator));
        let encode =
            |user_key: &[u8], seq, op| InternalKey::new(user_key.to_vec(), seq, op).encode();

        // Different user keys order by the user comparator
        assert!(comparator
            .compare(
                &encode(b"a", 100, Operation::Put),
                &encode(b"b", 1, Operation::Put)
            )
            .is_lt());

        // Equal user keys order by sequence number descending
        assert!(comparator
            .compare(
                &encode(b"k", 5, Operation::Put),
                &encode(b"k", 4, Operation::Put)
            )
            .is_lt());

        // Equal user keys and sequence numbers order by operation tag descending
        assert!(comparator
            .compare(
                &encode(b"k", 5, Operation::Put),
                &encode(b"k", 5, Operation::Delete)
            )
            .is_lt());

        assert!(comparator
            .compare(
                &encode(b"k", 5, Operation::Put),
                &encode(b"k", 5, Operation::Put)
            )
            .is_eq());
    }

    #[test]
    fn internal_separators_shorten_the_user_key_portion() {
        let comparator = InternalKeyComparator::new(Arc::new(BytewiseComparator));

        let mut start = InternalKey::new(b"helloworld".to_vec(), 42, Operation::Put).encode();
        let limit = InternalKey::new(b"hellozookeeper".to_vec(), 40, Operation::Put).encode();
        let original = start.clone();
        comparator.find_shortest_separator(&mut start, &limit);

        assert_eq!(extract_user_key(&start), b"hellox");
        assert_eq!(
            extract_trailer(&start),
            pack_sequence_and_operation(MAX_SEQUENCE_NUMBER, OPERATION_FOR_SEEKING)
        );
        assert!(comparator.compare(&original, &start).is_le());
        assert!(comparator.compare(&start, &limit).is_lt());
    }

    #[test]
    fn lookup_key_views_share_one_buffer() {
        let lookup_key = LookupKey::new(b"some-user-key".to_vec(), 99);

        assert_eq!(lookup_key.user_key(), b"some-user-key");
        assert_eq!(lookup_key.sequence_number(), 99);
        assert_eq!(
            extract_user_key(lookup_key.internal_key()),
            b"some-user-key"
        );
        assert!(lookup_key
            .memtable_key()
            .ends_with(lookup_key.internal_key()));
    }
}
