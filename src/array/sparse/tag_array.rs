//! The tag half of the sparse array pair: set-associative over line
//! addresses, each slot optionally pointing at a shared data-array entry.

use crate::array::sparse::SharingList;
use crate::config::SetAssocConfig;
use crate::error::ConfigError;
use crate::mem_req::MemReq;
use crate::policy::{Candidate, ReplPolicy};

/// Outcome of asking whether a tag's associated data entry can be freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictOutcome {
    /// The tag has no associated data entry.
    NoAssociation,
    /// The tag is exact, not approximate: its data is never shared, so it
    /// can always be freed.
    ExactSafeToFree,
    /// The tag is approximate but isn't the head of its sharing list;
    /// another tag still needs the data.
    NotListHead,
    /// The tag is approximate, is the list head, and other tags still share
    /// the data; the list must be rehomed to `new_head`.
    ListHeadStillShared {
        /// New head of the remaining sharing list.
        new_head: i64,
    },
    /// The tag was the sole remaining member of its sharing list; its data
    /// entry can be freed.
    SoleSurvivorSafeToFree,
}

/// A set-associative array of line tags, each optionally linked into a
/// sharing list rooted at a [`super::data_array::SparseDataArray`] entry.
#[derive(Debug)]
pub struct SparseTagArray {
    ways: usize,
    num_sets: usize,
    tag: Vec<u64>,
    map_id: Vec<i64>,
    approximate: Vec<bool>,
    list: SharingList,
    valid_lines: usize,
    pending_candidate: Option<usize>,
}

impl SparseTagArray {
    /// Builds a tag array per `config`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `config` doesn't validate (see
    /// [`SetAssocConfig::validate`]).
    pub fn new(config: SetAssocConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ways: config.ways,
            num_sets: config.num_sets(),
            tag: vec![0; config.num_lines],
            map_id: vec![-1; config.num_lines],
            approximate: vec![false; config.num_lines],
            list: SharingList::new(config.num_lines),
            valid_lines: 0,
            pending_candidate: None,
        })
    }

    fn set_of(&self, line_addr: u64) -> usize {
        (line_addr as usize) & (self.num_sets - 1)
    }

    /// Returns the tag id holding `line_addr`, if present.
    #[must_use]
    pub fn lookup(&self, line_addr: u64) -> Option<u64> {
        if line_addr == 0 {
            return None;
        }
        let set = self.set_of(line_addr);
        (0..self.ways)
            .map(|w| set * self.ways + w)
            .find(|&id| self.tag[id] == line_addr)
            .map(|id| id as u64)
    }

    /// Gathers the set's tags as candidates and ranks them via `policy`,
    /// returning `(candidate_tag_id, evicted_line_addr)`.
    pub fn preinsert(&mut self, line_addr: u64, policy: &mut dyn ReplPolicy) -> (u64, u64) {
        let set = self.set_of(line_addr);
        let candidates: Vec<Candidate> = (0..self.ways).map(|w| Candidate::new((set * self.ways + w) as u64)).collect();
        let victim = policy.rank(&candidates);
        self.pending_candidate = Some(victim as usize);
        (victim, self.tag[victim as usize])
    }

    /// Commits `req.line_addr` into the tag slot chosen by `preinsert`,
    /// associating it with data entry `map_id` (`-1` for none, meaning an
    /// exact, unshared line) and splicing it at the head of the sharing
    /// list rooted at `list_head`.
    pub fn postinsert(
        &mut self,
        tag_id: u64,
        req: &MemReq,
        map_id: i64,
        approximate: bool,
        list_head: i64,
        policy: &mut dyn ReplPolicy,
    ) {
        if self.pending_candidate != Some(tag_id as usize) {
            crate::error::fatal("SparseTagArray::postinsert candidate does not match preinsert result");
        }
        let id = tag_id as usize;
        match (self.tag[id] != 0, req.line_addr != 0) {
            (false, true) => self.valid_lines += 1,
            (true, false) => self.valid_lines -= 1,
            _ => {}
        }
        policy.replaced(tag_id);
        self.list.unlink(id);
        self.tag[id] = req.line_addr;
        self.map_id[id] = map_id;
        self.approximate[id] = approximate;
        if map_id != -1 {
            self.list.relink_at_head(id, list_head);
        }
        policy.update(tag_id, req);
        self.pending_candidate = None;
    }

    /// Rehomes an already-installed tag onto a different data entry without
    /// touching replacement-policy state or the valid-lines count (an
    /// approximate write changed which fingerprint the line maps to).
    pub fn change_in_place(&mut self, tag_id: u64, map_id: i64, approximate: bool, list_head: i64) {
        let id = tag_id as usize;
        self.list.unlink(id);
        self.map_id[id] = map_id;
        self.approximate[id] = approximate;
        if map_id != -1 {
            self.list.relink_at_head(id, list_head);
        }
    }

    /// Determines whether `tag_id`'s associated data entry can be freed,
    /// and what the sharing list looks like afterward.
    pub fn evict_associated_data(&mut self, tag_id: u64) -> EvictOutcome {
        let id = tag_id as usize;
        if self.map_id[id] == -1 {
            return EvictOutcome::NoAssociation;
        }
        if !self.approximate[id] {
            return EvictOutcome::ExactSafeToFree;
        }
        if self.list.prev_of(id) != -1 {
            return EvictOutcome::NotListHead;
        }
        let new_head = self.list.next_of(id);
        if new_head != -1 {
            return EvictOutcome::ListHeadStillShared { new_head };
        }
        EvictOutcome::SoleSurvivorSafeToFree
    }

    /// The data entry id `tag_id` is associated with, or `-1`.
    #[must_use]
    pub fn read_map_id(&self, tag_id: u64) -> i64 {
        self.map_id[tag_id as usize]
    }

    /// The line address held in `tag_id`.
    #[must_use]
    pub fn read_address(&self, tag_id: u64) -> u64 {
        self.tag[tag_id as usize]
    }

    /// The next tag in `tag_id`'s sharing list, or `-1`.
    #[must_use]
    pub fn read_next(&self, tag_id: u64) -> i64 {
        self.list.next_of(tag_id as usize)
    }

    /// The previous tag in `tag_id`'s sharing list, or `-1` if `tag_id` is
    /// its list's head (or unlinked).
    #[must_use]
    pub fn read_prev(&self, tag_id: u64) -> i64 {
        self.list.prev_of(tag_id as usize)
    }

    /// Number of non-empty tag slots.
    #[must_use]
    pub fn valid_lines(&self) -> usize {
        self.valid_lines
    }
}
