//! Uniform random replacement.
//!
//! - **Time Complexity:** `O(k)` per `rank` (one PRNG draw plus an index
//!   walk); `O(1)` per `update`/`replaced`.
//! - **Space Complexity:** `O(1)`, just the generator state.
//! - **Hardware Cost:** a single free-running LFSR; no per-line bookkeeping
//!   at all.
//! - **Best Case:** adversarial access patterns designed to defeat a
//!   deterministic policy (random has no exploitable structure).
//! - **Worst Case:** workloads with strong locality, where it evicts hot
//!   lines as readily as cold ones.

use crate::mem_req::MemReq;
use crate::policy::{Candidate, ReplPolicy};

/// Picks a uniformly random candidate each time, via a xorshift64 generator.
#[derive(Debug)]
pub struct RandomPolicy {
    state: u64,
}

impl RandomPolicy {
    /// Builds a generator seeded with a fixed constant, so runs are
    /// reproducible unless the caller reseeds explicitly.
    #[must_use]
    pub fn new() -> Self {
        Self::seeded(123_456_789)
    }

    /// Builds a generator seeded with `seed` (forced non-zero, since
    /// xorshift64 never leaves the zero state).
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplPolicy for RandomPolicy {
    fn rank(&mut self, candidates: &[Candidate]) -> u64 {
        if candidates.is_empty() {
            crate::error::fatal("rank called with no candidates");
        }
        let idx = (self.next() as usize) % candidates.len();
        candidates[idx].line_id
    }

    fn replaced(&mut self, _line_id: u64) {}

    fn update(&mut self, _line_id: u64, _req: &MemReq) {}
}
