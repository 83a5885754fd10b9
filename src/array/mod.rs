//! Cache array implementations: the contract every array type implements,
//! plus the set-associative, zcache and sparse tag/data variants.

pub mod set_assoc;
pub mod sparse;
pub mod zcache;

use crate::mem_req::MemReq;
use crate::policy::ReplPolicy;

/// The three-call contract every array implements: `lookup` to test
/// membership, `preinsert` to gather and rank an eviction candidate without
/// committing to it, and `postinsert` to commit the line the caller actually
/// chose.
///
/// Callers must not interleave two in-flight `preinsert`/`postinsert` pairs
/// on the same array: an array is allowed to retain state (the BFS walk's
/// swap path, in the zcache's case) between the two calls and does not
/// re-derive it from scratch in `postinsert`.
///
/// [`crate::array::sparse::tag_array::SparseTagArray`] and
/// [`crate::array::sparse::data_array::SparseDataArray`] deliberately do not
/// implement this trait: their operations carry extra parameters
/// (`map_id`, `approximate`, sharing-list heads) that don't fit the flat
/// three-method shape, matching the original's own separate class hierarchy
/// for the sparse pair.
pub trait CacheArray {
    /// Tests whether `req.line_addr` is present, returning its line id.
    ///
    /// On a hit, if `update_replacement` is set, notifies `policy` via
    /// [`ReplPolicy::update`] before returning.
    fn lookup(&mut self, req: &MemReq, update_replacement: bool, policy: &mut dyn ReplPolicy) -> Option<u64>;

    /// Finds an eviction candidate for `req`, ranks it via `policy`, and
    /// returns `(candidate_line_id, evicted_line_addr)`. Does not mutate the
    /// array's stored contents; only `postinsert` commits the change.
    fn preinsert(&mut self, req: &MemReq, policy: &mut dyn ReplPolicy) -> (u64, u64);

    /// Commits `req.line_addr` into the line id most recently returned by
    /// `preinsert`, notifying `policy` of the replacement and the install.
    fn postinsert(&mut self, candidate: u64, req: &MemReq, policy: &mut dyn ReplPolicy);
}
