//! Skewed-associative ("zcache") arrays: each way has its own hash, a line
//! occupies exactly one of `ways` candidate positions, and an eviction may
//! relocate a whole chain of lines one hop each rather than evicting
//! whatever a single set happens to contain.
//!
//! [`ZArray`] is the plain version. [`PartitionedZArray`] adds a per-line
//! owning domain and restricts eviction to lines belonging to the requesting
//! domain (plus, while a domain is still under-provisioned, empty slots),
//! so one tenant's fills can't evict another's lines without bound.

use crate::config::ZCacheConfig;
use crate::error::ConfigError;
use crate::hash::SharedHashFamily;
use crate::mem_req::MemReq;
use crate::policy::{Candidate, ReplPolicy};
use crate::stats::Counter;

/// A single node of the BFS relocation walk: the physical position it
/// occupies, the line id currently living there, and the index of the walk
/// node that reached it (`None` for one of the `ways` seeds).
#[derive(Debug, Clone, Copy)]
struct ZWalkInfo {
    pos: usize,
    line_id: u64,
    parent: Option<usize>,
}

/// Shared geometry and storage threaded between [`ZArray`] and
/// [`PartitionedZArray`]: the `lookupArray`/`array` split and the BFS walk
/// that relocates a chain of occupants to make room for a new line.
#[derive(Debug)]
struct ZCore {
    ways: usize,
    num_sets: usize,
    cands: usize,
    hash: SharedHashFamily,
    /// Line id currently installed at each physical position; permuted by
    /// every committed swap. Starts as the identity mapping.
    lookup_array: Vec<u64>,
    /// Line address held by each line id; never permuted except at the
    /// slot a `postinsert` actually fills.
    array: Vec<u64>,
    swap_array: Vec<usize>,
    last_cand_idx: Option<usize>,
    pending_victim: Option<u64>,
    swaps: Counter,
}

impl ZCore {
    fn new(config: ZCacheConfig, hash: SharedHashFamily) -> Result<Self, ConfigError> {
        config.validate()?;
        let num_lines = config.num_lines;
        tracing::info!(num_lines, ways = config.ways, cands = config.cands, "zcache array constructed");
        Ok(Self {
            ways: config.ways,
            num_sets: config.num_sets(),
            cands: config.cands,
            hash,
            lookup_array: (0..num_lines as u64).collect(),
            array: vec![0; num_lines],
            swap_array: Vec::new(),
            last_cand_idx: None,
            pending_victim: None,
            swaps: Counter::new(),
        })
    }

    fn set_mask(&self) -> u64 {
        self.num_sets as u64 - 1
    }

    fn seed_pos(&self, way: usize, line_addr: u64) -> usize {
        way * self.num_sets + (self.hash.hash(way, line_addr) & self.set_mask()) as usize
    }

    fn lookup_line_id(&self, req: &MemReq) -> Option<u64> {
        if req.line_addr == 0 {
            crate::error::fatal("zcache lookup called with line_addr = 0");
        }
        (0..self.ways).find_map(|w| {
            let pos = self.seed_pos(w, req.line_addr);
            let id = self.lookup_array[pos];
            (self.array[id as usize] == req.line_addr).then_some(id)
        })
    }

    /// Runs the BFS relocation walk for an incoming `line_addr`, growing the
    /// walk buffer breadth-first until `cands` distinct (non-self-revisit)
    /// candidates are gathered or some candidate's slot is already empty.
    ///
    /// A self-revisit (a way's hash sends a fringe node back to itself) is
    /// never pushed as a new node — the buffer only ever holds nodes that
    /// advance the walk, which is equivalent to the branchless
    /// "write-then-conditionally-count" form the original performance
    /// contract describes, since an uncounted write would just be
    /// overwritten by the next one anyway.
    fn walk(&self, line_addr: u64) -> Vec<ZWalkInfo> {
        let mut walk: Vec<ZWalkInfo> = (0..self.ways)
            .map(|w| {
                let pos = self.seed_pos(w, line_addr);
                ZWalkInfo { pos, line_id: self.lookup_array[pos], parent: None }
            })
            .collect();

        let mut all_valid = walk.iter().all(|n| self.array[n.line_id as usize] != 0);
        let mut fringe = 0;
        while walk.len() < self.cands && all_valid {
            if fringe >= walk.len() {
                break;
            }
            let fringe_idx = fringe;
            let fringe_id = walk[fringe_idx].line_id;
            let fringe_addr = self.array[fringe_id as usize];
            for w in 0..self.ways {
                let pos = w * self.num_sets + (self.hash.hash(w, fringe_addr) & self.set_mask()) as usize;
                let line_id = self.lookup_array[pos];
                all_valid &= self.array[line_id as usize] != 0;
                if line_id != fringe_id {
                    walk.push(ZWalkInfo { pos, line_id, parent: Some(fringe_idx) });
                }
            }
            fringe += 1;
        }
        if walk.len() > self.cands {
            walk.truncate(self.cands);
        }
        walk
    }

    fn swap_path(walk: &[ZWalkInfo], victim: u64) -> (usize, Vec<usize>) {
        let min_idx = walk
            .iter()
            .position(|n| n.line_id == victim)
            .unwrap_or_else(|| crate::error::fatal("zcache: chosen victim not found in walk buffer"));
        let mut swap_array = Vec::new();
        let mut idx = Some(min_idx);
        while let Some(i) = idx {
            swap_array.push(walk[i].pos);
            idx = walk[i].parent;
        }
        (min_idx, swap_array)
    }

    /// Commits the swap path computed by the last `preinsert`, relocating
    /// every occupant on the path one hop and installing `candidate` at the
    /// freed seed.
    fn commit(&mut self, candidate: u64, line_addr: u64) {
        let len = self.swap_array.len();
        assert!(
            self.lookup_array[self.swap_array[0]] == candidate,
            "zcache postinsert: swap path head does not hold the victim anymore"
        );
        for i in 0..len - 1 {
            self.lookup_array[self.swap_array[i]] = self.lookup_array[self.swap_array[i + 1]];
        }
        self.lookup_array[self.swap_array[len - 1]] = candidate;
        self.array[candidate as usize] = line_addr;
        self.swaps.inc((len - 1) as u64);
    }
}

/// Candidate ids gathered from a walk, deduplicated by construction (a
/// self-revisit never becomes its own node), truncated to at most `cands`.
fn candidate_ids(walk: &[ZWalkInfo]) -> Vec<Candidate> {
    walk.iter().map(|n| Candidate::new(n.line_id)).collect()
}

/// A plain skewed-associative (zcache) array: `ways` independent hash
/// tables over the same backing storage, with BFS relocation on eviction.
#[derive(Debug)]
pub struct ZArray {
    core: ZCore,
}

impl ZArray {
    /// Builds a zcache array per `config`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `config` doesn't validate (power of two
    /// set count, `ways >= 2`, `cands >= ways`).
    pub fn new(config: ZCacheConfig, hash: SharedHashFamily) -> Result<Self, ConfigError> {
        Ok(Self { core: ZCore::new(config, hash)? })
    }

    /// The minimum walk-buffer index matching the line chosen as victim by
    /// the most recent `preinsert`. Exposed for collaborator timing code
    /// that needs to schedule the array accesses the relocation implies;
    /// valid only until the next `preinsert`.
    #[must_use]
    pub fn last_cand_idx(&self) -> Option<usize> {
        self.core.last_cand_idx
    }

    /// Total number of relocation hops committed across every `postinsert`
    /// so far (one less than each swap path's length).
    #[must_use]
    pub fn swaps(&self) -> u64 {
        self.core.swaps.get()
    }
}

impl crate::array::CacheArray for ZArray {
    #[tracing::instrument(skip(self, req, policy), level = "trace")]
    fn lookup(&mut self, req: &MemReq, update_replacement: bool, policy: &mut dyn ReplPolicy) -> Option<u64> {
        let id = self.core.lookup_line_id(req)?;
        if update_replacement {
            policy.update(id, req);
        }
        Some(id)
    }

    #[tracing::instrument(skip(self, req, policy), level = "trace")]
    fn preinsert(&mut self, req: &MemReq, policy: &mut dyn ReplPolicy) -> (u64, u64) {
        let walk = self.core.walk(req.line_addr);
        let candidates = candidate_ids(&walk);
        let victim = policy.rank(&candidates);
        let (min_idx, swap_array) = ZCore::swap_path(&walk, victim);

        self.core.last_cand_idx = Some(min_idx);
        self.core.swap_array = swap_array;
        self.core.pending_victim = Some(victim);

        let wb_line_addr = self.core.array[victim as usize];
        tracing::debug!(line_addr = req.line_addr, victim, wb_line_addr, swap_len = self.core.swap_array.len(), "zcache preinsert");
        (victim, wb_line_addr)
    }

    #[tracing::instrument(skip(self, req, policy), level = "trace")]
    fn postinsert(&mut self, candidate: u64, req: &MemReq, policy: &mut dyn ReplPolicy) {
        if self.core.pending_victim != Some(candidate) {
            crate::error::fatal("ZArray::postinsert candidate does not match preinsert result");
        }
        self.core.commit(candidate, req.line_addr);
        policy.replaced(candidate);
        policy.update(candidate, req);
        self.core.pending_victim = None;
    }
}

/// Sentinel `preinsert` returns when no line eligible for eviction by
/// `req.srcId` exists among the walk's candidates. Chosen as `u64::MAX`:
/// this crate's line ids are `u64`-shaped everywhere else, so `u64::MAX`
/// is the unambiguous out-of-range analogue of the `-1` absence sentinel
/// used for sharing-list pointers, rather than reusing `num_lines` (the
/// original alternates between the two; see `DESIGN.md`).
pub const NO_ELIGIBLE_CANDIDATE: u64 = u64::MAX;

/// A zcache array partitioned across security/tenant domains: eviction may
/// only take a line already owned by the requesting domain, or (while that
/// domain hasn't yet filled half the array) an empty slot.
#[derive(Debug)]
pub struct PartitionedZArray {
    core: ZCore,
    domain: Vec<i64>,
    line_counters: Vec<usize>,
}

impl PartitionedZArray {
    /// Builds a partitioned zcache array per `config`, tracking eligibility
    /// counters for `num_domains` distinct requester domains.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `config` doesn't validate.
    pub fn new(config: ZCacheConfig, num_domains: usize, hash: SharedHashFamily) -> Result<Self, ConfigError> {
        let num_lines = config.num_lines;
        Ok(Self {
            core: ZCore::new(config, hash)?,
            domain: vec![-1; num_lines],
            line_counters: vec![0; num_domains],
        })
    }

    /// The minimum walk-buffer index matching the victim of the most recent
    /// `preinsert`, or `None` if that call returned [`NO_ELIGIBLE_CANDIDATE`].
    #[must_use]
    pub fn last_cand_idx(&self) -> Option<usize> {
        self.core.last_cand_idx
    }

    /// Total relocation hops committed so far.
    #[must_use]
    pub fn swaps(&self) -> u64 {
        self.core.swaps.get()
    }

    /// Tests whether `req.line_addr` is present, returning its line id.
    pub fn lookup(&mut self, req: &MemReq, update_replacement: bool, policy: &mut dyn ReplPolicy) -> Option<u64> {
        let id = self.core.lookup_line_id(req)?;
        if update_replacement {
            policy.update(id, req);
        }
        Some(id)
    }

    /// Finds an eviction candidate eligible for `req.src_id`, or
    /// [`NO_ELIGIBLE_CANDIDATE`] if none of the walk's candidates are owned
    /// by that domain (or empty, while the domain is still under-provisioned).
    pub fn preinsert(&mut self, req: &MemReq, policy: &mut dyn ReplPolicy) -> (u64, u64) {
        let walk = self.core.walk(req.line_addr);
        let src = i64::from(req.src_id);

        let any_loosely_eligible = walk.iter().any(|n| {
            let d = self.domain[n.line_id as usize];
            d == src || d == -1
        });
        if !any_loosely_eligible {
            tracing::debug!(line_addr = req.line_addr, src_id = req.src_id, "partitioned zcache: no eligible candidate");
            return (NO_ELIGIBLE_CANDIDATE, 0);
        }

        let under_provisioned = self.line_counters[req.src_id as usize] < self.core.array.len() / 2;
        let eligible: Vec<Candidate> = walk
            .iter()
            .filter(|n| {
                let d = self.domain[n.line_id as usize];
                if under_provisioned { d == src || d == -1 } else { d == src }
            })
            .map(|n| Candidate::new(n.line_id))
            .collect();
        if under_provisioned {
            self.line_counters[req.src_id as usize] += 1;
        }
        if eligible.is_empty() {
            // Only reachable once a domain is past the warm-up threshold and
            // every walk candidate is empty or owned by someone else.
            tracing::debug!(line_addr = req.line_addr, src_id = req.src_id, "partitioned zcache: no eligible candidate past warm-up");
            return (NO_ELIGIBLE_CANDIDATE, 0);
        }

        let victim = policy.rank(&eligible);
        let (min_idx, swap_array) = ZCore::swap_path(&walk, victim);
        self.core.last_cand_idx = Some(min_idx);
        self.core.swap_array = swap_array;
        self.core.pending_victim = Some(victim);

        let wb_line_addr = self.core.array[victim as usize];
        (victim, wb_line_addr)
    }

    /// Commits the candidate chosen by `preinsert`. A no-op when `candidate`
    /// is [`NO_ELIGIBLE_CANDIDATE`].
    pub fn postinsert(&mut self, candidate: u64, req: &MemReq, policy: &mut dyn ReplPolicy) {
        if candidate == NO_ELIGIBLE_CANDIDATE {
            return;
        }
        if self.core.pending_victim != Some(candidate) {
            crate::error::fatal("PartitionedZArray::postinsert candidate does not match preinsert result");
        }
        self.core.commit(candidate, req.line_addr);
        self.domain[candidate as usize] = i64::from(req.src_id);
        policy.replaced(candidate);
        policy.update(candidate, req);
        self.core.pending_victim = None;
    }
}
