/*!
A scoped bump allocator backing the memtable.

All allocations made from an arena stay alive until the arena itself is dropped, which is what
lets skip list nodes hand out raw references to entry bytes without individual lifetimes.
Allocation happens on the single writer path only; readers never touch the arena, so the block
bookkeeping sits behind a plain mutex while `memory_usage` is readable lock-free for
back-pressure checks.
*/

use parking_lot::Mutex;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The number of bytes allocated for a standard arena block.
const BLOCK_SIZE_BYTES: usize = 4096;

/// Bookkeeping for the block currently being carved up.
struct ArenaState {
    /// Position in the current block where the next allocation starts.
    alloc_ptr: *mut u8,

    /// The number of bytes left in the current block.
    alloc_bytes_remaining: usize,

    /**
    All blocks allocated so far.

    Blocks are boxed so that growing the vector never moves block storage, and they are stored
    as `u64` words so that every block start is 8-byte aligned.
    */
    blocks: Vec<Box<[u64]>>,
}

/// A bump allocator whose allocations live until the arena is dropped.
pub(crate) struct Arena {
    /// Allocation bookkeeping. Only the writer path locks this.
    state: Mutex<ArenaState>,

    /// Total bytes of memory used by the arena, including bookkeeping overhead.
    memory_usage: AtomicUsize,
}

/// Crate-only methods
impl Arena {
    /// Create a new, empty [`Arena`].
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ArenaState {
                alloc_ptr: std::ptr::null_mut(),
                alloc_bytes_remaining: 0,
                blocks: vec![],
            }),
            memory_usage: AtomicUsize::new(0),
        }
    }

    /**
    Allocate `num_bytes` bytes with no alignment guarantee.

    The returned pointer is valid for writes of `num_bytes` bytes and stays valid until the
    arena is dropped.

    # Panics

    `num_bytes` must be greater than zero.
    */
    pub(crate) fn allocate(&self, num_bytes: usize) -> NonNull<u8> {
        assert!(num_bytes > 0, "Attempted a zero-sized arena allocation.");

        let mut state = self.state.lock();
        if num_bytes <= state.alloc_bytes_remaining {
            let result = state.alloc_ptr;
            // SAFETY: `alloc_bytes_remaining` bytes starting at `alloc_ptr` are inside the
            // current block, so advancing by `num_bytes` stays in bounds.
            state.alloc_ptr = unsafe { result.add(num_bytes) };
            state.alloc_bytes_remaining -= num_bytes;
            return NonNull::new(result).unwrap();
        }

        self.allocate_fallback(&mut state, num_bytes)
    }

    /**
    Allocate `num_bytes` bytes aligned for pointer-sized values.

    Skip list nodes store atomics so they need this variant. The alignment used is the larger
    of 8 and the platform pointer size.
    */
    pub(crate) fn allocate_aligned(&self, num_bytes: usize) -> NonNull<u8> {
        assert!(num_bytes > 0, "Attempted a zero-sized arena allocation.");

        let align = if mem::align_of::<usize>() > 8 {
            mem::align_of::<usize>()
        } else {
            8
        };

        let mut state = self.state.lock();
        let current_mod = (state.alloc_ptr as usize) & (align - 1);
        let slop = if current_mod == 0 {
            0
        } else {
            align - current_mod
        };
        let needed = num_bytes + slop;

        if needed <= state.alloc_bytes_remaining {
            // SAFETY: `needed` bytes fit in the current block so both the slop skip and the
            // allocation itself stay in bounds.
            let result = unsafe { state.alloc_ptr.add(slop) };
            state.alloc_ptr = unsafe { result.add(num_bytes) };
            state.alloc_bytes_remaining -= needed;
            return NonNull::new(result).unwrap();
        }

        // Fallback blocks come straight out of the global allocator and are always aligned
        // well enough for pointer-sized values.
        self.allocate_fallback(&mut state, num_bytes)
    }

    /// Total memory reserved by the arena in bytes.
    pub(crate) fn memory_usage(&self) -> usize {
        self.memory_usage.load(Ordering::Acquire)
    }
}

/// Private methods
impl Arena {
    /// Allocate from a fresh block because the current block cannot fit `num_bytes`.
    fn allocate_fallback(&self, state: &mut ArenaState, num_bytes: usize) -> NonNull<u8> {
        if num_bytes > BLOCK_SIZE_BYTES / 4 {
            // Large allocations get a dedicated block so the remainder of the current block is
            // not wasted.
            let ptr = Self::push_block(state, num_bytes);
            self.record_block_usage(num_bytes);
            return ptr;
        }

        // The remainder of the current block is discarded.
        let ptr = Self::push_block(state, BLOCK_SIZE_BYTES);
        self.record_block_usage(BLOCK_SIZE_BYTES);

        // SAFETY: the new block is `BLOCK_SIZE_BYTES` long and `num_bytes` fits in it.
        state.alloc_ptr = unsafe { ptr.as_ptr().add(num_bytes) };
        state.alloc_bytes_remaining = BLOCK_SIZE_BYTES - num_bytes;

        ptr
    }

    /// Allocate a new zeroed block of at least `block_size` bytes and return its start.
    fn push_block(state: &mut ArenaState, block_size: usize) -> NonNull<u8> {
        let num_words = (block_size + 7) / 8;
        let mut block = vec![0u64; num_words].into_boxed_slice();
        let ptr = NonNull::new(block.as_mut_ptr() as *mut u8).unwrap();
        state.blocks.push(block);

        ptr
    }

    /// Account for a newly allocated block in the usage counter.
    fn record_block_usage(&self, block_size: usize) {
        self.memory_usage.fetch_add(
            block_size + mem::size_of::<Box<[u64]>>(),
            Ordering::Release,
        );
    }
}

/**
SAFETY:
The raw `alloc_ptr` is only dereferenced under the state mutex and always points into a block
owned by the arena. Handing the type across threads moves only ownership of those blocks.
*/
unsafe impl Send for Arena {}

/**
SAFETY:
All mutation of the allocation state happens under the mutex and the usage counter is atomic.
Pointers returned from `allocate` reference memory that is never moved or freed until drop.
*/
unsafe impl Sync for Arena {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_arena_reports_zero_usage() {
        let arena = Arena::new();
        assert_eq!(arena.memory_usage(), 0);
    }

    #[test]
    fn small_allocations_share_a_block() {
        let arena = Arena::new();
        arena.allocate(16);
        let usage_after_first = arena.memory_usage();
        arena.allocate(16);

        assert_eq!(
            arena.memory_usage(),
            usage_after_first,
            "A second small allocation should be carved from the existing block."
        );
    }

    #[test]
    fn large_allocations_get_a_dedicated_block() {
        let arena = Arena::new();
        arena.allocate(8);
        let usage_after_small = arena.memory_usage();

        arena.allocate(BLOCK_SIZE_BYTES);
        assert!(arena.memory_usage() >= usage_after_small + BLOCK_SIZE_BYTES);

        // The original block should still be usable for small allocations.
        let usage_after_large = arena.memory_usage();
        arena.allocate(8);
        assert_eq!(arena.memory_usage(), usage_after_large);
    }

    #[test]
    fn aligned_allocations_are_aligned() {
        let arena = Arena::new();
        // Skew the bump pointer with an odd-sized allocation first.
        arena.allocate(3);

        for _ in 0..100 {
            let ptr = arena.allocate_aligned(24);
            assert_eq!((ptr.as_ptr() as usize) % 8, 0);
        }
    }

    #[test]
    fn allocations_are_writable_and_stable() {
        let arena = Arena::new();
        let mut pointers = vec![];
        for fill in 0..=255u8 {
            let ptr = arena.allocate(64);
            // SAFETY: the arena returned a pointer valid for 64 bytes.
            unsafe { std::ptr::write_bytes(ptr.as_ptr(), fill, 64) };
            pointers.push((ptr, fill));
        }

        for (ptr, fill) in pointers {
            // SAFETY: arena memory lives until drop and is never moved.
            let slice = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 64) };
            assert!(slice.iter().all(|byte| *byte == fill));
        }
    }
}
