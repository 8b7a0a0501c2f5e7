/*!
A SiltDB specific iterator interface that has more cursor-like behavior.

The SiltDB iterator differs from [`std::iter::Iterator`] in that it moves one cursor back and
forth over a sorted range of entries and can be repositioned at arbitrary targets. The same
contract is implemented by the memtable, by block readers, and by the two-level table iterator
so that the compositions stay interchangeable.
*/

use crate::errors::SiltDbResult;

/**
A cursor over a sorted sequence of key-value entries.

The cursor starts out invalid. One of the seek methods must be called before `key` or `value`
can be used. Keys yielded by implementations in this crate are encoded internal keys.
*/
pub trait SiltDbIterator {
    /// Returns true if the cursor is positioned at an entry.
    fn is_valid(&self) -> bool;

    /// Position the cursor at the first entry with a key that is at or past `target`.
    fn seek(&mut self, target: &[u8]);

    /// Position the cursor at the first entry.
    fn seek_to_first(&mut self);

    /// Position the cursor at the last entry.
    fn seek_to_last(&mut self);

    /**
    Move to the next entry.

    The cursor becomes invalid when this is called at the last entry.
    */
    fn next(&mut self);

    /**
    Move to the previous entry.

    The cursor becomes invalid when this is called at the first entry.
    */
    fn prev(&mut self);

    /**
    The key at the current cursor position.

    # Panics

    The cursor must be valid.
    */
    fn key(&self) -> &[u8];

    /**
    The value at the current cursor position.

    # Panics

    The cursor must be valid.
    */
    fn value(&self) -> &[u8];

    /// Any error the iterator encountered e.g. a corrupt block entry.
    fn status(&mut self) -> SiltDbResult<()>;
}
