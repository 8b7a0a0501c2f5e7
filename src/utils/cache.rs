/*!
A sharded, capacity-bounded cache with a least-recently-used eviction policy and pinning.

The cache maps byte-string keys to values and charges each entry against a fixed capacity.
Clients pin entries by holding the handle returned from `insert` or `lookup`; pinned entries
are never evicted, and an entry's deleter runs exactly once, after the entry has been both
evicted (or erased) and released by every client.

# Sharding

Keys are distributed over 16 internal shards by the top 4 bits of a stable 32-bit hash. Each
shard has its own mutex, so lookups for different shards proceed in parallel and no lock is
held during a deleter call.

# Entry states

Within a shard, every cached entry is on exactly one of two circular lists:

- the LRU list: entries only the cache references (`refs == 1`), eligible for eviction, kept
  in recency order
- the in-use list: entries some client also references (`refs >= 2`), never evicted

Entries leave the cache (`in_cache == false`) by eviction, by `erase`, or by being displaced
when a duplicate key is inserted; they are freed once their reference count drains to zero.
*/

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::utils::hash::hash;

/// The number of hash bits used to select a shard.
const NUM_SHARD_BITS: usize = 4;

/// The number of shards the cache key space is split into.
const NUM_SHARDS: usize = 1 << NUM_SHARD_BITS;

/// The seed used for the cache's key hash.
const CACHE_HASH_SEED: u32 = 0;

/// Callback invoked with the key and value when an entry is freed.
pub type DeleterFn<V> = Box<dyn FnOnce(&[u8], V) + Send>;

/**
A token pinning one cache entry.

The entry stays valid (and its charge counted) until the handle is passed back to
[`ShardedLruCache::release`]. Each handle must be released exactly once.
*/
#[derive(Debug)]
pub struct CacheHandle {
    /// The shard holding the entry.
    shard_index: usize,

    /// The entry's slot within the shard.
    slot: usize,
}

/// One cache entry in a shard's slab. Slots 0 and 1 of every shard are list sentinels.
struct CacheEntry<V> {
    /// The entry's key. Empty for sentinels and freed slots.
    key: Vec<u8>,

    /// The stored value. [`None`] for sentinels and freed slots.
    value: Option<V>,

    /// Callback to run when the entry is freed.
    deleter: Option<DeleterFn<V>>,

    /// The capacity cost charged for this entry.
    charge: usize,

    /// References to the entry: one for the cache itself while cached, one per client handle.
    refs: u32,

    /// True while the entry is reachable through the shard's key table.
    in_cache: bool,

    /// Next slot in the circular list this entry is on.
    next: usize,

    /// Previous slot in the circular list this entry is on.
    prev: usize,
}

/// A value and its deleter, collected under the shard lock and dropped outside it.
struct DeadEntry<V> {
    key: Vec<u8>,
    value: V,
    deleter: Option<DeleterFn<V>>,
}

impl<V> DeadEntry<V> {
    /// Run the deleter, or just drop the value if there is none.
    fn finalize(self) {
        if let Some(deleter) = self.deleter {
            deleter(&self.key, self.value);
        }
    }
}

/// The sentinel slot heading the LRU list. `next` is the oldest entry, `prev` the newest.
const LRU_SENTINEL: usize = 0;

/// The sentinel slot heading the in-use list.
const IN_USE_SENTINEL: usize = 1;

/// A single shard: a slab of entries, the two lists, and the key table.
struct LruShard<V> {
    /// The capacity in charge units assigned to this shard.
    capacity: usize,

    /// The summed charge of all in-cache entries.
    usage: usize,

    /// Slab storage for entries. List links are slot indexes into this vector.
    entries: Vec<CacheEntry<V>>,

    /// Slots of freed entries available for reuse.
    free_slots: Vec<usize>,

    /// Maps keys to the slot of their in-cache entry.
    table: HashMap<Vec<u8>, usize>,
}

impl<V> LruShard<V> {
    fn new(capacity: usize) -> Self {
        let mut shard = Self {
            capacity,
            usage: 0,
            entries: vec![],
            free_slots: vec![],
            table: HashMap::new(),
        };

        // The two list sentinels, each linked to itself.
        for sentinel in [LRU_SENTINEL, IN_USE_SENTINEL] {
            shard.entries.push(CacheEntry {
                key: vec![],
                value: None,
                deleter: None,
                charge: 0,
                refs: 0,
                in_cache: false,
                next: sentinel,
                prev: sentinel,
            });
        }

        shard
    }

    /// Unlink `slot` from whichever list it is on.
    fn list_remove(&mut self, slot: usize) {
        let (prev, next) = (self.entries[slot].prev, self.entries[slot].next);
        self.entries[prev].next = next;
        self.entries[next].prev = prev;
    }

    /// Link `slot` in as the newest entry of the list headed by `sentinel`.
    fn list_append(&mut self, sentinel: usize, slot: usize) {
        let last = self.entries[sentinel].prev;
        self.entries[slot].prev = last;
        self.entries[slot].next = sentinel;
        self.entries[last].next = slot;
        self.entries[sentinel].prev = slot;
    }

    /// Take a slot for a new entry, reusing a freed one when possible.
    fn allocate_slot(
        &mut self,
        key: Vec<u8>,
        value: V,
        charge: usize,
        deleter: Option<DeleterFn<V>>,
    ) -> usize {
        let entry = CacheEntry {
            key,
            value: Some(value),
            deleter,
            charge,
            refs: 1,
            in_cache: false,
            next: 0,
            prev: 0,
        };

        match self.free_slots.pop() {
            Some(slot) => {
                self.entries[slot] = entry;
                slot
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        }
    }

    /// Add a client reference, migrating the entry off the LRU list if needed.
    fn ref_entry(&mut self, slot: usize) {
        if self.entries[slot].refs == 1 && self.entries[slot].in_cache {
            self.list_remove(slot);
            self.list_append(IN_USE_SENTINEL, slot);
        }

        self.entries[slot].refs += 1;
    }

    /// Drop one reference, freeing the entry or demoting it to the LRU list as appropriate.
    fn unref(&mut self, slot: usize, dead: &mut Vec<DeadEntry<V>>) {
        debug_assert!(self.entries[slot].refs > 0);
        self.entries[slot].refs -= 1;

        if self.entries[slot].refs == 0 {
            debug_assert!(!self.entries[slot].in_cache);
            let entry = &mut self.entries[slot];
            dead.push(DeadEntry {
                key: std::mem::take(&mut entry.key),
                value: entry.value.take().expect("A freed entry must hold a value."),
                deleter: entry.deleter.take(),
            });
            self.free_slots.push(slot);
        } else if self.entries[slot].in_cache && self.entries[slot].refs == 1 {
            // No client holds the entry anymore. It becomes reclaimable.
            self.list_remove(slot);
            self.list_append(LRU_SENTINEL, slot);
        }
    }

    /// Remove the entry at `slot` from the cache's accounting. The key table entry must have
    /// been removed (or displaced) already.
    fn finish_erase(&mut self, slot: usize, dead: &mut Vec<DeadEntry<V>>) {
        debug_assert!(self.entries[slot].in_cache);
        self.list_remove(slot);
        self.entries[slot].in_cache = false;
        self.usage -= self.entries[slot].charge;
        self.unref(slot, dead);
    }

    fn insert(
        &mut self,
        key: Vec<u8>,
        value: V,
        charge: usize,
        deleter: Option<DeleterFn<V>>,
        dead: &mut Vec<DeadEntry<V>>,
    ) -> usize {
        let slot = self.allocate_slot(key.clone(), value, charge, deleter);

        if self.capacity > 0 {
            // One reference for the cache itself on top of the returned handle's.
            self.entries[slot].refs += 1;
            self.entries[slot].in_cache = true;
            self.list_append(IN_USE_SENTINEL, slot);
            self.usage += charge;

            if let Some(displaced_slot) = self.table.insert(key, slot) {
                self.finish_erase(displaced_slot, dead);
            }
        }

        // Evict from the cold end of the LRU list until back under capacity. Pinned entries
        // are on the in-use list and are never touched.
        while self.usage > self.capacity
            && self.entries[LRU_SENTINEL].next != LRU_SENTINEL
        {
            let oldest = self.entries[LRU_SENTINEL].next;
            let removed = self.table.remove(&self.entries[oldest].key);
            debug_assert_eq!(removed, Some(oldest));
            self.finish_erase(oldest, dead);
        }

        slot
    }

    fn lookup(&mut self, key: &[u8]) -> Option<usize> {
        let slot = *self.table.get(key)?;
        self.ref_entry(slot);

        Some(slot)
    }

    fn erase(&mut self, key: &[u8], dead: &mut Vec<DeadEntry<V>>) {
        if let Some(slot) = self.table.remove(key) {
            self.finish_erase(slot, dead);
        }
    }

    fn prune(&mut self, dead: &mut Vec<DeadEntry<V>>) {
        while self.entries[LRU_SENTINEL].next != LRU_SENTINEL {
            let oldest = self.entries[LRU_SENTINEL].next;
            let removed = self.table.remove(&self.entries[oldest].key);
            debug_assert_eq!(removed, Some(oldest));
            self.finish_erase(oldest, dead);
        }
    }
}

impl<V> Drop for LruShard<V> {
    fn drop(&mut self) {
        // Clients must have released every handle by now; anything left on the in-use list is
        // a leak in the caller.
        debug_assert_eq!(self.entries[IN_USE_SENTINEL].next, IN_USE_SENTINEL);

        let mut dead = vec![];
        self.prune(&mut dead);
        for entry in dead {
            entry.finalize();
        }
    }
}

/**
A fixed-capacity cache mapping byte-string keys to values, with LRU eviction and pinning.

# Concurrency

The cache is thread-safe. Each shard synchronizes with its own mutex and deleters run outside
any lock.
*/
pub struct ShardedLruCache<V> {
    /// The shards, selected by the top bits of the key hash.
    shards: Vec<Mutex<LruShard<V>>>,

    /// The last client partition ID given out by [`ShardedLruCache::new_id`].
    last_id: AtomicU64,
}

/// Public methods
impl<V> ShardedLruCache<V> {
    /**
    Create a new [`ShardedLruCache`] with the given total capacity in charge units.

    Capacity is divided evenly across the shards, rounding up.
    */
    pub fn new(capacity: usize) -> Self {
        let per_shard = (capacity + NUM_SHARDS - 1) / NUM_SHARDS;
        let shards = (0..NUM_SHARDS)
            .map(|_| Mutex::new(LruShard::new(per_shard)))
            .collect();

        Self {
            shards,
            last_id: AtomicU64::new(0),
        }
    }

    /**
    Insert a key-value pair with the given charge.

    If an entry with the same key is already cached it is displaced, though it stays alive for
    any clients still holding handles to it. The returned handle pins the new entry until it
    is released.
    */
    pub fn insert(
        &self,
        key: Vec<u8>,
        value: V,
        charge: usize,
        deleter: Option<DeleterFn<V>>,
    ) -> CacheHandle {
        let shard_index = Self::shard_index(&key);
        let mut dead = vec![];
        let slot = self.shards[shard_index]
            .lock()
            .insert(key, value, charge, deleter, &mut dead);
        Self::finalize_dead(dead);

        CacheHandle { shard_index, slot }
    }

    /// Look up `key`, pinning and returning its entry if cached.
    pub fn lookup(&self, key: &[u8]) -> Option<CacheHandle> {
        let shard_index = Self::shard_index(key);
        let slot = self.shards[shard_index].lock().lookup(key)?;

        Some(CacheHandle { shard_index, slot })
    }

    /// Release a handle obtained from `insert` or `lookup`.
    pub fn release(&self, handle: CacheHandle) {
        let mut dead = vec![];
        self.shards[handle.shard_index]
            .lock()
            .unref(handle.slot, &mut dead);
        Self::finalize_dead(dead);
    }

    /**
    Drop the cached entry for `key` if there is one.

    Clients holding handles to the entry keep it alive; it is only unreachable for future
    lookups.
    */
    pub fn erase(&self, key: &[u8]) {
        let shard_index = Self::shard_index(key);
        let mut dead = vec![];
        self.shards[shard_index].lock().erase(key, &mut dead);
        Self::finalize_dead(dead);
    }

    /**
    A numeric ID for a client sharing this cache.

    Multiple clients may share one cache; each allocates an ID at startup and prefixes its
    keys with it to partition the key space.
    */
    pub fn new_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Evict every entry that is not pinned.
    pub fn prune(&self) {
        for shard in &self.shards {
            let mut dead = vec![];
            shard.lock().prune(&mut dead);
            Self::finalize_dead(dead);
        }
    }

    /// The summed charge of all cached entries.
    pub fn total_charge(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().usage).sum()
    }
}

/// Methods needing cloneable values
impl<V: Clone> ShardedLruCache<V> {
    /// The value of the entry a handle pins.
    pub fn value(&self, handle: &CacheHandle) -> V {
        self.shards[handle.shard_index].lock().entries[handle.slot]
            .value
            .clone()
            .expect("A pinned entry must hold a value.")
    }
}

/// Private methods
impl<V> ShardedLruCache<V> {
    /// Select the shard for `key` from the top bits of its hash.
    fn shard_index(key: &[u8]) -> usize {
        (hash(key, CACHE_HASH_SEED) >> (32 - NUM_SHARD_BITS)) as usize
    }

    /// Run the deleters of entries that died during an operation. No lock is held here.
    fn finalize_dead(dead: Vec<DeadEntry<V>>) {
        for entry in dead {
            entry.finalize();
        }
    }
}
