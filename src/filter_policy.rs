/*!
This module provides a common interface for filter policies. A filter policy builds a small
summary from a set of keys; the summary is stored in table files and consulted during reads to
decide whether a block could possibly hold a key, saving disk seeks on misses.

SiltDB ships a Bloom filter based policy that should be adequate for most situations.
*/

use crate::utils::hash::hash;

/// The seed used when hashing keys into Bloom filters. Part of the table file format.
const BLOOM_HASH_SEED: u32 = 0xbc9f_1d34;

/// Builds and checks the per-region key summaries stored in table files.
pub trait FilterPolicy: Send + Sync {
    /**
    The name of the filter policy.

    The name is recorded in table files next to the filters. If the serialized shape of the
    filter changes in any way, the name returned here must change with it so that old filters
    are not interpreted with new code.
    */
    fn name(&self) -> &str;

    /**
    Create a filter summarizing `keys`.

    The keys may contain duplicates. Returns the serialized filter, suitable for storage in a
    table file.
    */
    fn create_filter(&self, keys: &[&[u8]]) -> Vec<u8>;

    /**
    Returns true if `key` may have been in the set the filter was created from.

    # Invariants

    1. Must return true if the key was in the set used to create the filter.
    1. May return true or false for keys not in the set, but should aim for false with high
       probability.
    */
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

/**
A Bloom filter based filter policy.

The filter uses double hashing to derive its probe sequence from a single base hash: the
second hash is the first rotated by 17 bits. The serialized form is the bit array followed by
one byte holding the probe count.
*/
pub struct BloomFilterPolicy {
    /**
    The number of filter bits allocated per key.

    A good value is 10, which yields a filter with a roughly 1% false positive rate.
    */
    bits_per_key: usize,

    /// The number of probes per key, derived from `bits_per_key` as `bits_per_key * ln(2)`.
    num_probes: usize,
}

/// Public methods
impl BloomFilterPolicy {
    /// Create a new [`BloomFilterPolicy`].
    pub fn new(bits_per_key: usize) -> Self {
        // ln(2) is approximately 0.69
        let mut num_probes = (bits_per_key as f64 * 0.69) as usize;
        num_probes = num_probes.clamp(1, 30);

        Self {
            bits_per_key,
            num_probes,
        }
    }
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &str {
        "siltdb.BuiltinBloomFilter"
    }

    fn create_filter(&self, keys: &[&[u8]]) -> Vec<u8> {
        // Compute the bloom filter size, rounding up to a whole number of bytes. Small key
        // sets keep a 64-bit floor to hold the false positive rate down.
        let mut filter_size_bits = keys.len() * self.bits_per_key;
        if filter_size_bits < 64 {
            filter_size_bits = 64;
        }
        let filter_size_bytes = (filter_size_bits + 7) / 8;
        filter_size_bits = filter_size_bytes * 8;

        let mut filter = vec![0u8; filter_size_bytes];
        for key in keys {
            // Use double hashing to generate a sequence of probe positions from one hash.
            let mut h = hash(key, BLOOM_HASH_SEED);
            let delta = (h >> 17) | (h << 15);
            for _ in 0..self.num_probes {
                let bit_position = (h as usize) % filter_size_bits;
                filter[bit_position / 8] |= 1 << (bit_position % 8);
                h = h.wrapping_add(delta);
            }
        }

        // The probe count rides along as the last byte so readers built with different
        // parameters still check stored filters correctly.
        filter.push(self.num_probes as u8);

        filter
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        if filter.len() < 2 {
            return false;
        }

        let filter_size_bits = (filter.len() - 1) * 8;
        let num_probes = filter[filter.len() - 1] as usize;
        if num_probes > 30 {
            // Reserved for potentially new encodings. Consider the key a match.
            return true;
        }

        let mut h = hash(key, BLOOM_HASH_SEED);
        let delta = (h >> 17) | (h << 15);
        for _ in 0..num_probes {
            let bit_position = (h as usize) % filter_size_bits;
            if filter[bit_position / 8] & (1 << (bit_position % 8)) == 0 {
                return false;
            }
            h = h.wrapping_add(delta);
        }

        true
    }
}
