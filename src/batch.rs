/*!
A batch couples any number of mutations into one atomic unit: the whole batch becomes a single
write-ahead log record and a single pass of memtable inserts.

# Serialization

A batch is held in its wire format at all times:

1. The base sequence number as a fixed-size 8 byte integer
1. The record count as a fixed-size 4 byte integer
1. The records themselves, each a one byte operation tag followed by a length-prefixed key and,
   for puts, a length-prefixed value

The records in a batch with base sequence `s` receive the sequence numbers `s..s+n-1` in
declaration order when the batch is applied to a memtable.
*/

use integer_encoding::FixedInt;

use crate::errors::{SiltDbError, SiltDbResult};
use crate::key::Operation;
use crate::memtable::MemTable;
use crate::utils::coding::{append_length_prefixed_slice, decode_length_prefixed_slice};

/// The length of the sequence number and count header of a serialized batch.
const BATCH_HEADER_LENGTH_BYTES: usize = 12;

/// A handler that receives the records of a batch in declaration order.
pub trait BatchHandler {
    /// Called for each put record.
    fn put(&mut self, key: &[u8], value: &[u8]);

    /// Called for each delete record.
    fn delete(&mut self, key: &[u8]);
}

/// A set of mutations to apply atomically.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    /// The serialized representation of the batch.
    contents: Vec<u8>,
}

/// Public methods
impl Batch {
    /// Create a new, empty [`Batch`].
    pub fn new() -> Self {
        Self {
            contents: vec![0; BATCH_HEADER_LENGTH_BYTES],
        }
    }

    /// Record an insertion or update of the value at `key`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.set_count(self.count() + 1);
        self.contents.push(Operation::Put as u8);
        append_length_prefixed_slice(&mut self.contents, key);
        append_length_prefixed_slice(&mut self.contents, value);
    }

    /// Record a deletion of the value at `key`.
    pub fn delete(&mut self, key: &[u8]) {
        self.set_count(self.count() + 1);
        self.contents.push(Operation::Delete as u8);
        append_length_prefixed_slice(&mut self.contents, key);
    }

    /// The number of records in the batch.
    pub fn count(&self) -> u32 {
        u32::decode_fixed(&self.contents[8..BATCH_HEADER_LENGTH_BYTES])
    }

    /// The base sequence number stored in the batch header.
    pub fn sequence_number(&self) -> u64 {
        u64::decode_fixed(&self.contents[0..8])
    }

    /// Set the base sequence number in the batch header.
    pub fn set_sequence_number(&mut self, sequence_number: u64) {
        self.contents[0..8].copy_from_slice(&u64::encode_fixed_vec(sequence_number));
    }

    /// The size in bytes of the serialized batch.
    pub fn approximate_size(&self) -> usize {
        self.contents.len()
    }

    /// Returns true if the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Reset the batch to its newly constructed state.
    pub fn clear(&mut self) {
        self.contents.clear();
        self.contents.resize(BATCH_HEADER_LENGTH_BYTES, 0);
    }

    /**
    Append the records of `other` to this batch.

    The count becomes the sum of both counts. This batch's base sequence number is untouched.
    */
    pub fn append_batch(&mut self, other: &Batch) {
        self.set_count(self.count() + other.count());
        self.contents
            .extend_from_slice(&other.contents[BATCH_HEADER_LENGTH_BYTES..]);
    }

    /**
    Walk the batch records in declaration order and dispatch each to `handler`.

    Returns a [`SiltDbError::Corruption`] if the records are malformed or if the number of
    records does not match the count in the header.
    */
    pub fn iterate(&self, handler: &mut dyn BatchHandler) -> SiltDbResult<()> {
        if self.contents.len() < BATCH_HEADER_LENGTH_BYTES {
            return Err(SiltDbError::Corruption(
                "The batch is smaller than a batch header.".to_string(),
            ));
        }

        let mut records = &self.contents[BATCH_HEADER_LENGTH_BYTES..];
        let mut records_found: u32 = 0;
        while !records.is_empty() {
            records_found += 1;
            let tag = records[0];
            records = &records[1..];

            match tag {
                tag if tag == Operation::Put as u8 => {
                    let (key, consumed) = decode_length_prefixed_slice(records)
                        .ok_or_else(|| Batch::record_corruption("put key"))?;
                    records = &records[consumed..];
                    let (value, consumed) = decode_length_prefixed_slice(records)
                        .ok_or_else(|| Batch::record_corruption("put value"))?;
                    records = &records[consumed..];

                    handler.put(key, value);
                }
                tag if tag == Operation::Delete as u8 => {
                    let (key, consumed) = decode_length_prefixed_slice(records)
                        .ok_or_else(|| Batch::record_corruption("delete key"))?;
                    records = &records[consumed..];

                    handler.delete(key);
                }
                _ => {
                    return Err(SiltDbError::Corruption(format!(
                        "Unknown operation tag ({}) in a batch record.",
                        tag
                    )));
                }
            }
        }

        if records_found != self.count() {
            return Err(SiltDbError::Corruption(format!(
                "The batch header declared {} records but {} were found.",
                self.count(),
                records_found
            )));
        }

        Ok(())
    }

    /**
    Apply the batch to `memtable`.

    The i-th record is inserted at sequence number `base + i` where `base` is the batch's
    stored sequence number.
    */
    pub fn insert_into(&self, memtable: &MemTable) -> SiltDbResult<()> {
        let mut inserter = MemTableInserter {
            sequence_number: self.sequence_number(),
            memtable,
        };

        self.iterate(&mut inserter)
    }

    /// The serialized bytes of the batch i.e. what gets appended to the write-ahead log.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /**
    Reconstitute a batch from its serialized bytes, e.g. a record recovered from the
    write-ahead log.
    */
    pub fn from_contents(contents: Vec<u8>) -> SiltDbResult<Self> {
        if contents.len() < BATCH_HEADER_LENGTH_BYTES {
            return Err(SiltDbError::Corruption(
                "The batch is smaller than a batch header.".to_string(),
            ));
        }

        Ok(Self { contents })
    }
}

/// Private methods
impl Batch {
    /// Write `count` into the batch header.
    fn set_count(&mut self, count: u32) {
        self.contents[8..BATCH_HEADER_LENGTH_BYTES]
            .copy_from_slice(&u32::encode_fixed_vec(count));
    }

    /// Build the corruption error for a record field that failed to decode.
    fn record_corruption(field: &str) -> SiltDbError {
        SiltDbError::Corruption(format!("Failed to decode the {} of a batch record.", field))
    }
}

/// A [`BatchHandler`] that inserts records into a memtable with consecutive sequence numbers.
struct MemTableInserter<'m> {
    /// The sequence number the next record will be inserted at.
    sequence_number: u64,

    /// The memtable receiving the records.
    memtable: &'m MemTable,
}

impl BatchHandler for MemTableInserter<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.memtable
            .add(self.sequence_number, Operation::Put, key, value);
        self.sequence_number += 1;
    }

    fn delete(&mut self, key: &[u8]) {
        self.memtable
            .add(self.sequence_number, Operation::Delete, key, b"");
        self.sequence_number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;
    use crate::key::{InternalKeyComparator, LookupKey};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    /// A handler that records the dispatched operations for inspection.
    #[derive(Default)]
    struct RecordingHandler {
        operations: Vec<(Operation, Vec<u8>, Vec<u8>)>,
    }

    impl BatchHandler for RecordingHandler {
        fn put(&mut self, key: &[u8], value: &[u8]) {
            self.operations
                .push((Operation::Put, key.to_vec(), value.to_vec()));
        }

        fn delete(&mut self, key: &[u8]) {
            self.operations
                .push((Operation::Delete, key.to_vec(), vec![]));
        }
    }

    fn new_memtable() -> MemTable {
        MemTable::new(InternalKeyComparator::new(Arc::new(BytewiseComparator)))
    }

    #[test]
    fn records_are_dispatched_in_declaration_order() {
        let mut batch = Batch::new();
        batch.put(b"a", b"1");
        batch.delete(b"b");
        batch.put(b"c", b"3");

        let mut handler = RecordingHandler::default();
        batch.iterate(&mut handler).unwrap();

        assert_eq!(batch.count(), 3);
        assert_eq!(
            handler.operations,
            vec![
                (Operation::Put, b"a".to_vec(), b"1".to_vec()),
                (Operation::Delete, b"b".to_vec(), vec![]),
                (Operation::Put, b"c".to_vec(), b"3".to_vec()),
            ]
        );
    }

    #[test]
    fn insertion_assigns_consecutive_sequence_numbers() {
        let mut batch = Batch::new();
        batch.set_sequence_number(100);
        batch.put(b"k", b"v100");
        batch.put(b"k", b"v101");
        batch.delete(b"k");

        let memtable = new_memtable();
        batch.insert_into(&memtable).unwrap();

        // A put followed by a delete leaves the key deleted at any later sequence
        let result = memtable.get(&LookupKey::new(b"k".to_vec(), 200));
        assert!(matches!(result, Some(Err(SiltDbError::NotFound(_)))));

        // The intermediate versions remain visible at their sequence numbers
        let result = memtable.get(&LookupKey::new(b"k".to_vec(), 101));
        assert_eq!(result.unwrap().unwrap(), b"v101".to_vec());
        let result = memtable.get(&LookupKey::new(b"k".to_vec(), 100));
        assert_eq!(result.unwrap().unwrap(), b"v100".to_vec());
    }

    #[test]
    fn appended_batches_sum_their_counts() {
        let mut destination = Batch::new();
        destination.set_sequence_number(7);
        destination.put(b"a", b"1");

        let mut source = Batch::new();
        source.set_sequence_number(9999);
        source.put(b"b", b"2");
        source.delete(b"a");

        destination.append_batch(&source);

        assert_eq!(destination.count(), 3);
        assert_eq!(
            destination.sequence_number(),
            7,
            "Appending must not disturb the destination's sequence header."
        );

        let mut handler = RecordingHandler::default();
        destination.iterate(&mut handler).unwrap();
        assert_eq!(handler.operations.len(), 3);
    }

    #[test]
    fn a_count_mismatch_is_corruption() {
        let mut batch = Batch::new();
        batch.put(b"a", b"1");

        let mut tampered = Batch::from_contents(batch.contents().to_vec()).unwrap();
        tampered.set_count(2);

        let mut handler = RecordingHandler::default();
        let result = tampered.iterate(&mut handler);
        assert!(matches!(result, Err(SiltDbError::Corruption(_))));
    }

    #[test]
    fn truncated_records_are_corruption() {
        let mut batch = Batch::new();
        batch.put(b"some key", b"some value");

        let mut contents = batch.contents().to_vec();
        contents.truncate(contents.len() - 3);
        let truncated = Batch::from_contents(contents).unwrap();

        let mut handler = RecordingHandler::default();
        assert!(matches!(
            truncated.iterate(&mut handler),
            Err(SiltDbError::Corruption(_))
        ));
    }

    #[test]
    fn clearing_resets_the_batch() {
        let mut batch = Batch::new();
        batch.set_sequence_number(42);
        batch.put(b"a", b"1");
        batch.clear();

        assert!(batch.is_empty());
        assert_eq!(batch.count(), 0);
        assert_eq!(batch.sequence_number(), 0);
        assert_eq!(batch.approximate_size(), 12);
    }
}
