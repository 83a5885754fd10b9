//! First-in-first-out replacement, tracked per line id.
//!
//! - **Time Complexity:** `O(k)` per `rank`; `O(1)` per `update`/`replaced`.
//! - **Space Complexity:** `O(n)` insertion-order timestamps.
//! - **Hardware Cost:** a single free-running counter per installed line,
//!   compared against rather than a per-set round-robin pointer, since
//!   lines no longer live in fixed `(set, way)` slots.
//! - **Best Case:** streaming / scan-dominated workloads where recency
//!   doesn't predict reuse any better than insertion order.
//! - **Worst Case:** workloads with a hot line that was installed early and
//!   is still in active use; FIFO evicts it on schedule regardless.

use crate::mem_req::MemReq;
use crate::policy::{Candidate, ReplPolicy};

/// Ranks candidates by how long ago they were installed. Unlike
/// [`crate::policy::lru::LruPolicy`], a hit does not reset a line's
/// position in FIFO order.
#[derive(Debug, Default)]
pub struct FifoPolicy {
    clock: u64,
    inserted_at: std::collections::HashMap<u64, u64>,
}

impl FifoPolicy {
    /// Builds a fresh FIFO policy with no recorded history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplPolicy for FifoPolicy {
    fn rank(&mut self, candidates: &[Candidate]) -> u64 {
        candidates
            .iter()
            .min_by_key(|c| self.inserted_at.get(&c.line_id).copied().unwrap_or(0))
            .map_or_else(|| crate::error::fatal("rank called with no candidates"), |c| c.line_id)
    }

    fn replaced(&mut self, line_id: u64) {
        self.inserted_at.remove(&line_id);
    }

    fn update(&mut self, line_id: u64, _req: &MemReq) {
        self.clock += 1;
        self.inserted_at.entry(line_id).or_insert(self.clock);
    }
}
