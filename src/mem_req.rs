//! The minimal request shape that arrays and policies need to see.
//!
//! A real memory hierarchy's request carries far more (coherence state,
//! timing, bus routing); this crate only needs the fields its arrays and
//! policies actually read, so [`MemReq`] is deliberately narrow rather than
//! a reconstruction of the original's full request object.

/// A line-granularity request passed into an array's `preinsert`/`postinsert`
/// pair and on into a replacement policy's `rank`/`update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemReq {
    /// The line address being looked up or installed.
    pub line_addr: u64,
    /// Program counter of the access, used by [`crate::policy::hawkeye`]'s
    /// PC-indexed predictor.
    pub pc: u64,
    /// Requesting domain/source id, used by partitioned zcache eligibility
    /// filtering.
    pub src_id: u32,
}

impl MemReq {
    /// Builds a request with `src_id` set to 0, for callers that don't care
    /// about partitioning.
    pub fn new(line_addr: u64, pc: u64) -> Self {
        Self {
            line_addr,
            pc,
            src_id: 0,
        }
    }
}
