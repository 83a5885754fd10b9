//! Per-way hash functions used to scatter a line address across a zcache's
//! lookup tables.
//!
//! The simulator this crate is modeled on ships a family of H3 hash
//! functions tuned per way; no reference implementation of that family was
//! available to ground this module on, so the concrete [`H3HashFamily`]
//! below is this crate's own invention: a fixed per-way multiplicative
//! constant folded with `splitmix64`'s mixing step, which is enough to
//! decorrelate ways without needing a table of random bits per instance.

use std::sync::Arc;

/// Scatters a line address into a per-way hash value.
///
/// Implementations must be deterministic: the same `(way, addr)` pair must
/// always hash to the same value, since [`crate::array::zcache::ZArray`]
/// relies on being able to recompute a line's candidate position from its
/// address alone.
pub trait HashFamily: std::fmt::Debug {
    /// Hashes `addr` for lookup table `way`.
    fn hash(&self, way: usize, addr: u64) -> u64;
}

/// A fixed set of multiplicative constants, one per way, mixed through
/// `splitmix64`.
#[derive(Debug, Clone)]
pub struct H3HashFamily {
    way_constants: Vec<u64>,
}

impl H3HashFamily {
    /// Builds a hash family for `num_ways` ways.
    ///
    /// Constants are derived from a fixed seed so that two arrays built
    /// with the same way count hash identically, which keeps tests
    /// reproducible without needing to thread a seed through configs.
    pub fn new(num_ways: usize) -> Self {
        let mut state = 0x9E37_79B9_7F4A_7C15_u64;
        let way_constants = (0..num_ways)
            .map(|_| {
                state = splitmix64(state);
                state | 1
            })
            .collect();
        Self { way_constants }
    }
}

impl HashFamily for H3HashFamily {
    fn hash(&self, way: usize, addr: u64) -> u64 {
        let constant = self.way_constants[way];
        splitmix64(addr.wrapping_mul(constant).wrapping_add(way as u64))
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Shared ownership of a hash family, the way arrays hold on to it: many
/// arrays in a hierarchy can be built over the same family instance.
pub type SharedHashFamily = Arc<dyn HashFamily + Send + Sync>;
