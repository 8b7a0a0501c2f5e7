/*!
The memtable is the mutable in-memory buffer at the head of the write path. Entries are
encoded into a single arena-owned byte string per mutation and indexed by the skip list, so
the structure the readers traverse never holds partially written data.

# Serialization

Each entry is stored as the skip list key itself:

1. The internal key length as a varint32
1. The user key
1. The 8-byte sequence number and operation trailer
1. The value length as a varint32
1. The value

Deletions are entries with a `Delete` trailer and an empty value. Entries are never mutated
and their memory is owned by the memtable's arena, which lives until the last reference to the
memtable is dropped.
*/

use std::cmp::Ordering;
use std::sync::Arc;

use integer_encoding::VarInt;

use crate::comparator::Comparator;
use crate::errors::{SiltDbError, SiltDbResult};
use crate::iterator::SiltDbIterator;
use crate::key::{
    append_internal_key, extract_trailer, extract_user_key, InternalKeyComparator, LookupKey,
    Operation,
};
use crate::skiplist::{SkipList, SkipListIter};
use crate::utils::arena::Arena;
use crate::utils::coding::{append_length_prefixed_slice, decode_length_prefixed_slice};

/**
A comparator for serialized memtable entries.

Memtable entries lead with a length-prefixed internal key, so this strips the prefixes and
delegates to the internal key comparator.
*/
struct MemTableKeyComparator {
    /// The comparator for the internal keys inside the entries.
    internal_key_comparator: InternalKeyComparator,
}

impl Comparator for MemTableKeyComparator {
    fn name(&self) -> &str {
        "siltdb.MemTableKeyComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let (internal_key_a, _) = decode_length_prefixed_slice(a)
            .expect("A memtable entry must lead with a length-prefixed internal key.");
        let (internal_key_b, _) = decode_length_prefixed_slice(b)
            .expect("A memtable entry must lead with a length-prefixed internal key.");

        self.internal_key_comparator
            .compare(internal_key_a, internal_key_b)
    }

    fn find_shortest_separator(&self, _start: &mut Vec<u8>, _limit: &[u8]) {
        // Memtable keys never feed an index block so there is nothing to shorten.
    }

    fn find_short_successor(&self, _key: &mut Vec<u8>) {
        // Memtable keys never feed an index block so there is nothing to shorten.
    }
}

/**
The in-memory buffer for recent writes.

# Concurrency

Reads may run concurrently with each other and with the single writer. `add` calls must be
externally serialized, which the engine's writer mutex takes care of. Shared ownership (e.g. a
compactor pinning the memtable while draining it) is expressed by cloning the `Arc` this
memtable is held through; the arena and every entry in it are freed when the last clone drops.
*/
pub struct MemTable {
    /// The comparator for the internal keys stored in the entries.
    internal_key_comparator: InternalKeyComparator,

    /// The arena owning all entry memory.
    arena: Arc<Arena>,

    /// The skip list indexing the encoded entries.
    table: SkipList,
}

/// Public methods
impl MemTable {
    /// Create a new, empty [`MemTable`].
    pub fn new(internal_key_comparator: InternalKeyComparator) -> Self {
        let arena = Arc::new(Arena::new());
        let entry_comparator = Arc::new(MemTableKeyComparator {
            internal_key_comparator: internal_key_comparator.clone(),
        });

        Self {
            internal_key_comparator,
            table: SkipList::new(entry_comparator, Arc::clone(&arena)),
            arena,
        }
    }

    /**
    Add an entry to the memtable.

    Deletions are recorded by passing [`Operation::Delete`] and an empty value.

    # Concurrency

    Callers must guarantee that no other `add` runs concurrently.
    */
    pub fn add(&self, sequence_number: u64, operation: Operation, user_key: &[u8], value: &[u8]) {
        let internal_key_length = user_key.len() + 8;
        let mut buf = Vec::with_capacity(5 + internal_key_length + 5 + value.len());
        buf.extend(u32::encode_var_vec(internal_key_length as u32));
        append_internal_key(&mut buf, user_key, sequence_number, operation);
        append_length_prefixed_slice(&mut buf, value);

        self.table.insert(&buf);
    }

    /**
    Get the value for the given lookup key.

    Because the entry ordering places larger sequence numbers first for equal user keys, the
    first entry at or past the lookup key is the newest version visible at the lookup's
    sequence number.

    Returns the stored value if the newest visible version is a put, a
    [`SiltDbError::NotFound`] if it is a tombstone, and [`None`] if the memtable has no
    version of the key at all so that the caller can consult older tables.
    */
    pub fn get(&self, lookup_key: &LookupKey) -> Option<SiltDbResult<Vec<u8>>> {
        let mut iter = self.table.iter();
        iter.seek(lookup_key.memtable_key());
        if !iter.is_valid() {
            return None;
        }

        let entry = iter.key();
        let (internal_key, key_region_length) = match decode_length_prefixed_slice(entry) {
            Some(decoded) => decoded,
            None => {
                return Some(Err(SiltDbError::Corruption(
                    "Failed to decode a memtable entry's internal key.".to_string(),
                )))
            }
        };

        let user_comparator = self.internal_key_comparator.user_comparator();
        if user_comparator
            .compare(extract_user_key(internal_key), lookup_key.user_key())
            .is_ne()
        {
            return None;
        }

        let trailer = extract_trailer(internal_key);
        match (trailer & 0xff) as u8 {
            tag if tag == Operation::Put as u8 => {
                match decode_length_prefixed_slice(&entry[key_region_length..]) {
                    Some((value, _)) => Some(Ok(value.to_vec())),
                    None => Some(Err(SiltDbError::Corruption(
                        "Failed to decode a memtable entry's value.".to_string(),
                    ))),
                }
            }
            tag if tag == Operation::Delete as u8 => Some(Err(SiltDbError::NotFound(Some(
                "The newest visible version of the key is a tombstone.".to_string(),
            )))),
            tag => Some(Err(SiltDbError::Corruption(format!(
                "A memtable entry carried an unknown operation tag ({}).",
                tag
            )))),
        }
    }

    /// Returns the approximate memory usage of the memtable in bytes.
    pub fn approximate_memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }

    /**
    Get an iterator over the memtable entries.

    The iterator yields serialized internal keys and stored values in entry order.
    */
    pub fn iter(&self) -> MemTableIter<'_> {
        MemTableIter {
            iter: self.table.iter(),
            seek_scratch: vec![],
        }
    }
}

/// A cursor over the entries of a [`MemTable`].
pub struct MemTableIter<'a> {
    /// The underlying skip list cursor positioned at whole encoded entries.
    iter: SkipListIter<'a>,

    /// Reusable buffer for converting internal key targets into memtable keys.
    seek_scratch: Vec<u8>,
}

impl SiltDbIterator for MemTableIter<'_> {
    fn is_valid(&self) -> bool {
        self.iter.is_valid()
    }

    fn seek(&mut self, target: &[u8]) {
        // Targets are internal keys. Re-frame the target as a memtable key.
        self.seek_scratch.clear();
        self.seek_scratch
            .extend(u32::encode_var_vec(target.len() as u32));
        self.seek_scratch.extend_from_slice(target);

        self.iter.seek(&self.seek_scratch);
    }

    fn seek_to_first(&mut self) {
        self.iter.seek_to_first();
    }

    fn seek_to_last(&mut self) {
        self.iter.seek_to_last();
    }

    fn next(&mut self) {
        self.iter.next();
    }

    fn prev(&mut self) {
        self.iter.prev();
    }

    fn key(&self) -> &[u8] {
        let entry = self.iter.key();
        let (internal_key, _) = decode_length_prefixed_slice(entry)
            .expect("A memtable entry must lead with a length-prefixed internal key.");

        internal_key
    }

    fn value(&self) -> &[u8] {
        let entry = self.iter.key();
        let (_, key_region_length) = decode_length_prefixed_slice(entry)
            .expect("A memtable entry must lead with a length-prefixed internal key.");
        let (value, _) = decode_length_prefixed_slice(&entry[key_region_length..])
            .expect("A memtable entry must carry a length-prefixed value.");

        value
    }

    fn status(&mut self) -> SiltDbResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;
    use pretty_assertions::assert_eq;

    fn new_memtable() -> MemTable {
        MemTable::new(InternalKeyComparator::new(Arc::new(BytewiseComparator)))
    }

    #[test]
    fn the_newest_visible_version_wins() {
        let memtable = new_memtable();
        memtable.add(3, Operation::Put, b"k", b"v3");
        memtable.add(1, Operation::Put, b"k", b"v1");
        memtable.add(4, Operation::Delete, b"k", b"");

        // Sequence 5 sees the tombstone at sequence 4
        let result = memtable.get(&LookupKey::new(b"k".to_vec(), 5));
        assert!(matches!(result, Some(Err(SiltDbError::NotFound(_)))));

        // Sequence 3 sees the put at sequence 3
        let result = memtable.get(&LookupKey::new(b"k".to_vec(), 3));
        assert_eq!(result.unwrap().unwrap(), b"v3".to_vec());

        // Sequence 2 sees the put at sequence 1
        let result = memtable.get(&LookupKey::new(b"k".to_vec(), 2));
        assert_eq!(result.unwrap().unwrap(), b"v1".to_vec());

        // Sequence 0 predates every version so the caller must check older tables
        assert!(memtable.get(&LookupKey::new(b"k".to_vec(), 0)).is_none());
    }

    #[test]
    fn misses_defer_to_older_tables() {
        let memtable = new_memtable();
        memtable.add(1, Operation::Put, b"present", b"value");

        assert!(memtable.get(&LookupKey::new(b"absent".to_vec(), 100)).is_none());
    }

    #[test]
    fn iteration_orders_by_user_key_then_descending_sequence() {
        let memtable = new_memtable();
        memtable.add(1, Operation::Put, b"b", b"b1");
        memtable.add(2, Operation::Put, b"a", b"a2");
        memtable.add(3, Operation::Put, b"b", b"b3");

        let mut iter = memtable.iter();
        iter.seek_to_first();

        let mut observed = vec![];
        while iter.is_valid() {
            observed.push((
                extract_user_key(iter.key()).to_vec(),
                extract_trailer(iter.key()) >> 8,
                iter.value().to_vec(),
            ));
            iter.next();
        }

        assert_eq!(
            observed,
            vec![
                (b"a".to_vec(), 2, b"a2".to_vec()),
                (b"b".to_vec(), 3, b"b3".to_vec()),
                (b"b".to_vec(), 1, b"b1".to_vec()),
            ]
        );
    }

    #[test]
    fn memory_usage_grows_with_entries() {
        let memtable = new_memtable();
        let initial_usage = memtable.approximate_memory_usage();

        for num in 0..100u32 {
            memtable.add(
                num as u64,
                Operation::Put,
                format!("key{num}").as_bytes(),
                &[0xab; 128],
            );
        }

        assert!(memtable.approximate_memory_usage() > initial_usage);
    }
}
