/*!
An ordered in-memory index implemented as a skip list with wait-free reads.

The list supports exactly one writer at a time and arbitrarily many concurrent readers.
Readers never block and never allocate. The correctness of that arrangement rests on three
rules:

1. Nodes are allocated from the arena and are never freed while the list is alive.
1. After a node has been linked in, its next-pointers are the only field that ever changes.
1. A writer fully initializes a new node and then publishes it bottom-up with a release-store
   into each predecessor's next-pointer. Readers traverse with acquire-loads, so observing a
   link to a node implies observing that node's initialized contents.

The height of the list is written without a barrier. A reader that sees a stale, smaller
height still returns correct results: any pointers at newly added levels either are null or
lead to fully published nodes.
*/

use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::comparator::Comparator;
use crate::utils::arena::Arena;

/// The maximum height of any node in the skip list.
const MAX_HEIGHT: usize = 12;

/// Each level is kept with probability 1 in `BRANCHING_FACTOR` relative to the level below.
const BRANCHING_FACTOR: u32 = 4;

/**
A node in the skip list.

The `next` field is declared with one element but nodes are allocated with room for
`height` pointers, so levels beyond the first index past the end of the declared array. The
`#[repr(C)]` layout keeps the tower at the end of the struct to make that sound.
*/
#[repr(C)]
struct Node {
    /// Pointer to this node's key bytes in the arena.
    key_ptr: *const u8,

    /// The length of this node's key in bytes.
    key_length: usize,

    /// The tower of forward links. Entry 0 is the full-list level.
    next: [AtomicPtr<Node>; 1],
}

impl Node {
    /// The key stored at this node.
    fn key(&self) -> &[u8] {
        // SAFETY: `key_ptr` points at `key_length` bytes in the arena, which outlives every
        // node.
        unsafe { std::slice::from_raw_parts(self.key_ptr, self.key_length) }
    }

    /// Return the tower entry for `level`.
    fn tower(&self, level: usize) -> &AtomicPtr<Node> {
        debug_assert!(level < MAX_HEIGHT);

        // SAFETY: the node was allocated with a tower of at least `level + 1` entries; see
        // `SkipList::new_node`.
        unsafe { &*self.next.as_ptr().add(level) }
    }

    /// Load the next node at `level`, synchronizing with the publishing store.
    fn next(&self, level: usize) -> *mut Node {
        self.tower(level).load(Ordering::Acquire)
    }

    /// Store the next node at `level`, publishing `node` and its contents to readers.
    fn set_next(&self, level: usize, node: *mut Node) {
        self.tower(level).store(node, Ordering::Release);
    }

    /// Load the next node at `level` without a barrier. Writer-only.
    fn next_relaxed(&self, level: usize) -> *mut Node {
        self.tower(level).load(Ordering::Relaxed)
    }

    /// Store the next node at `level` without a barrier. Only safe before the node is linked.
    fn set_next_relaxed(&self, level: usize, node: *mut Node) {
        self.tower(level).store(node, Ordering::Relaxed);
    }
}

/**
An ordered set of byte-string keys with wait-free reads.

# Concurrency

Inserts must be externally serialized: the engine's writer mutex guarantees at most one
`insert` call at a time. Reads (`contains` and iteration) may run concurrently with each other
and with the single writer without any locking.
*/
pub(crate) struct SkipList {
    /// The arena that owns all node and key memory.
    arena: Arc<Arena>,

    /// The comparator defining the key order.
    comparator: Arc<dyn Comparator>,

    /// The sentinel node that heads every level. Its key is never read.
    head: NonNull<Node>,

    /**
    The current tallest node height.

    Read with relaxed ordering everywhere. A stale value only makes a traversal start at a
    lower level, which is still correct.
    */
    max_height: AtomicUsize,
}

/// Crate-only methods
impl SkipList {
    /// Create a new, empty [`SkipList`] whose nodes live in `arena`.
    pub(crate) fn new(comparator: Arc<dyn Comparator>, arena: Arc<Arena>) -> Self {
        let head = Self::allocate_node(&arena, &[], MAX_HEIGHT);

        Self {
            arena,
            comparator,
            head,
            max_height: AtomicUsize::new(1),
        }
    }

    /**
    Insert `key` into the list.

    # Concurrency

    Callers must guarantee that no other `insert` runs concurrently.

    # Panics

    An equal key must not already be present in the list.
    */
    pub(crate) fn insert(&self, key: &[u8]) {
        let mut prev: [*mut Node; MAX_HEIGHT] = [ptr::null_mut(); MAX_HEIGHT];
        let successor = self.find_greater_or_equal(key, Some(&mut prev));

        // SAFETY: nodes returned by the search are either null or live for the arena lifetime.
        assert!(
            successor.is_null()
                || unsafe { self.comparator.compare((*successor).key(), key).is_ne() },
            "Attempted to insert a key that is already present in the skip list."
        );

        let height = self.random_height();
        let current_max = self.current_max_height();
        if height > current_max {
            for level_prev in prev.iter_mut().take(height).skip(current_max) {
                *level_prev = self.head.as_ptr();
            }

            // No barrier needed: concurrent readers seeing the old height just start lower.
            self.max_height.store(height, Ordering::Relaxed);
        }

        let new_node = Self::allocate_node(&self.arena, key, height).as_ptr();
        for level in 0..height {
            // SAFETY: every entry of `prev` up to `height` points at a live node, and the new
            // node is not reachable yet so its relaxed store cannot be observed.
            unsafe {
                (*new_node).set_next_relaxed(level, (*prev[level]).next_relaxed(level));
                // Publication point: after this release-store readers at this level can reach
                // the fully initialized node.
                (*prev[level]).set_next(level, new_node);
            }
        }
    }

    /// Returns true if an entry equal to `key` is in the list. Never blocks, never allocates.
    pub(crate) fn contains(&self, key: &[u8]) -> bool {
        let node = self.find_greater_or_equal(key, None);
        if node.is_null() {
            return false;
        }

        // SAFETY: non-null nodes live for the arena lifetime.
        unsafe { self.comparator.compare((*node).key(), key).is_eq() }
    }

    /// Get an iterator over the list.
    pub(crate) fn iter(&self) -> SkipListIter<'_> {
        SkipListIter {
            list: self,
            current: ptr::null(),
        }
    }
}

/// Private methods
impl SkipList {
    /// Allocate and initialize a node with a tower of `height` levels in `arena`.
    fn allocate_node(arena: &Arena, key: &[u8], height: usize) -> NonNull<Node> {
        debug_assert!((1..=MAX_HEIGHT).contains(&height));

        let key_ptr = if key.is_empty() {
            NonNull::<u8>::dangling().as_ptr() as *const u8
        } else {
            let key_mem = arena.allocate(key.len());
            // SAFETY: the arena returned a pointer valid for `key.len()` writes.
            unsafe {
                ptr::copy_nonoverlapping(key.as_ptr(), key_mem.as_ptr(), key.len());
            }
            key_mem.as_ptr() as *const u8
        };

        let node_size =
            mem::size_of::<Node>() + (height - 1) * mem::size_of::<AtomicPtr<Node>>();
        let node = arena.allocate_aligned(node_size).cast::<Node>();

        // SAFETY: the allocation is sized and aligned for a node with a `height`-entry tower.
        // Fields are written before the node is published to any other thread.
        unsafe {
            let node_ptr = node.as_ptr();
            ptr::addr_of_mut!((*node_ptr).key_ptr).write(key_ptr);
            ptr::addr_of_mut!((*node_ptr).key_length).write(key.len());
            let tower_base = ptr::addr_of_mut!((*node_ptr).next) as *mut AtomicPtr<Node>;
            for level in 0..height {
                tower_base.add(level).write(AtomicPtr::new(ptr::null_mut()));
            }
        }

        node
    }

    /// The height the list currently operates at.
    fn current_max_height(&self) -> usize {
        self.max_height.load(Ordering::Relaxed)
    }

    /// Returns true if `key` sorts after the key at `node`.
    fn key_is_after_node(&self, key: &[u8], node: *mut Node) -> bool {
        if node.is_null() {
            return false;
        }

        // SAFETY: non-null nodes live for the arena lifetime.
        unsafe { self.comparator.compare((*node).key(), key).is_lt() }
    }

    /**
    Find the first node with a key at or past `key`. Returns null if every key is smaller.

    When `prev` is provided, it is filled with the rightmost node at each level whose key is
    before `key`. This is the splice the writer links a new node into.
    */
    fn find_greater_or_equal(
        &self,
        key: &[u8],
        mut prev: Option<&mut [*mut Node; MAX_HEIGHT]>,
    ) -> *mut Node {
        let mut node = self.head.as_ptr();
        let mut level = self.current_max_height() - 1;

        loop {
            // SAFETY: `node` is the head or a node reached through published links.
            let next = unsafe { (*node).next(level) };
            if self.key_is_after_node(key, next) {
                node = next;
            } else {
                if let Some(prev_links) = prev.as_deref_mut() {
                    prev_links[level] = node;
                }

                if level == 0 {
                    return next;
                }

                level -= 1;
            }
        }
    }

    /// Find the last node with a key before `key`. Returns the head if there is none.
    fn find_less_than(&self, key: &[u8]) -> *mut Node {
        let mut node = self.head.as_ptr();
        let mut level = self.current_max_height() - 1;

        loop {
            // SAFETY: `node` is the head or a node reached through published links.
            let next = unsafe { (*node).next(level) };
            let next_is_before_key = !next.is_null()
                && unsafe { self.comparator.compare((*next).key(), key).is_lt() };

            if next_is_before_key {
                node = next;
            } else if level == 0 {
                return node;
            } else {
                level -= 1;
            }
        }
    }

    /// Find the last node in the list. Returns the head if the list is empty.
    fn find_last(&self) -> *mut Node {
        let mut node = self.head.as_ptr();
        let mut level = self.current_max_height() - 1;

        loop {
            // SAFETY: `node` is the head or a node reached through published links.
            let next = unsafe { (*node).next(level) };
            if !next.is_null() {
                node = next;
            } else if level == 0 {
                return node;
            } else {
                level -= 1;
            }
        }
    }

    /// Draw a height from a geometric distribution with ratio 1/`BRANCHING_FACTOR`.
    fn random_height(&self) -> usize {
        let mut rng = rand::thread_rng();
        let mut height = 1;
        while height < MAX_HEIGHT && rng.gen_range(0..BRANCHING_FACTOR) == 0 {
            height += 1;
        }

        height
    }
}

/**
SAFETY:
Node and key memory is owned by the arena, which the list holds an `Arc` to, so sending the
list to another thread cannot outlive its storage.
*/
unsafe impl Send for SkipList {}

/**
SAFETY:
Shared access is the designed mode of this structure: readers only follow acquire-loaded
links to immutable node contents, and the single-writer requirement on `insert` is part of
that method's contract.
*/
unsafe impl Sync for SkipList {}

/// A cursor over the entries of a [`SkipList`].
pub(crate) struct SkipListIter<'a> {
    /// The list being iterated.
    list: &'a SkipList,

    /// The node the cursor is at, or null if the cursor is invalid.
    current: *const Node,
}

/// Crate-only methods
impl SkipListIter<'_> {
    /// Returns true if the cursor is positioned at an entry.
    pub(crate) fn is_valid(&self) -> bool {
        !self.current.is_null()
    }

    /**
    The key at the cursor.

    # Panics

    The cursor must be valid.
    */
    pub(crate) fn key(&self) -> &[u8] {
        assert!(self.is_valid());

        // SAFETY: valid cursors point at live nodes whose keys are immutable.
        unsafe { (*self.current).key() }
    }

    /// Advance to the next entry.
    pub(crate) fn next(&mut self) {
        assert!(self.is_valid());

        // SAFETY: valid cursors point at live nodes.
        self.current = unsafe { (*self.current).next(0) };
    }

    /**
    Retreat to the previous entry.

    There are no back-pointers, so this searches from the head in O(log n).
    */
    pub(crate) fn prev(&mut self) {
        assert!(self.is_valid());

        let node = self.list.find_less_than(self.key());
        self.current = if node == self.list.head.as_ptr() {
            ptr::null()
        } else {
            node
        };
    }

    /// Position the cursor at the first entry with a key at or past `target`.
    pub(crate) fn seek(&mut self, target: &[u8]) {
        self.current = self.list.find_greater_or_equal(target, None);
    }

    /// Position the cursor at the first entry.
    pub(crate) fn seek_to_first(&mut self) {
        // SAFETY: the head node always exists.
        self.current = unsafe { (*self.list.head.as_ptr()).next(0) };
    }

    /// Position the cursor at the last entry.
    pub(crate) fn seek_to_last(&mut self) {
        let node = self.list.find_last();
        self.current = if node == self.list.head.as_ptr() {
            ptr::null()
        } else {
            node
        };
    }
}
