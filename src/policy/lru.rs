//! Least-recently-used replacement, tracked per line id.
//!
//! - **Time Complexity:** `O(k)` per `rank` call over `k` candidates; `O(1)`
//!   per `update`/`replaced`.
//! - **Space Complexity:** `O(n)` timestamps for `n` tracked lines.
//! - **Hardware Cost:** a real LRU stack needs `log2(ways)` bits per way per
//!   set; this crate tracks a single global logical clock instead, which is
//!   the software-model equivalent of per-set recency stacks once lines are
//!   addressed by a flat id rather than `(set, way)`.
//! - **Best Case:** workloads with strong temporal locality and a working
//!   set that fits the array.
//! - **Worst Case:** cyclic access patterns larger than the array (LRU
//!   evicts exactly the line about to be reused).

use crate::mem_req::MemReq;
use crate::policy::{Candidate, ReplPolicy};

/// Ranks candidates by how long ago they were last touched.
#[derive(Debug, Default)]
pub struct LruPolicy {
    clock: u64,
    last_used: std::collections::HashMap<u64, u64>,
}

impl LruPolicy {
    /// Builds a fresh LRU policy with no recorded history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, line_id: u64) {
        self.clock += 1;
        self.last_used.insert(line_id, self.clock);
    }
}

impl ReplPolicy for LruPolicy {
    fn rank(&mut self, candidates: &[Candidate]) -> u64 {
        candidates
            .iter()
            .min_by_key(|c| self.last_used.get(&c.line_id).copied().unwrap_or(0))
            .map_or_else(|| crate::error::fatal("rank called with no candidates"), |c| c.line_id)
    }

    fn replaced(&mut self, line_id: u64) {
        self.last_used.remove(&line_id);
    }

    fn update(&mut self, line_id: u64, _req: &MemReq) {
        self.touch(line_id);
    }
}
