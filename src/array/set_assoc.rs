//! Conventional N-way set-associative array: one hash picks the set, and the
//! set's `ways` slots are scanned linearly for an exact address match.

use crate::array::CacheArray;
use crate::config::SetAssocConfig;
use crate::error::ConfigError;
use crate::hash::SharedHashFamily;
use crate::mem_req::MemReq;
use crate::policy::{Candidate, ReplPolicy};

/// A plain set-associative array: `num_sets` sets of `ways` lines each,
/// addressed by `hash.hash(0, line_addr) & (num_sets - 1)`.
#[derive(Debug)]
pub struct SetAssocArray {
    ways: usize,
    num_sets: usize,
    hash: SharedHashFamily,
    addr: Vec<u64>,
    pending_candidate: Option<u64>,
}

impl SetAssocArray {
    /// Builds a set-associative array per `config`, sharing `hash` with any
    /// other array in the same hierarchy.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `config` doesn't validate (see
    /// [`SetAssocConfig::validate`]).
    pub fn new(config: SetAssocConfig, hash: SharedHashFamily) -> Result<Self, ConfigError> {
        config.validate()?;
        let num_sets = config.num_sets();
        tracing::info!(num_lines = config.num_lines, ways = config.ways, num_sets, "set-associative array constructed");
        Ok(Self {
            ways: config.ways,
            num_sets,
            hash,
            addr: vec![0; config.num_lines],
            pending_candidate: None,
        })
    }

    fn set_of(&self, line_addr: u64) -> usize {
        (self.hash.hash(0, line_addr) & (self.num_sets as u64 - 1)) as usize
    }
}

impl CacheArray for SetAssocArray {
    #[tracing::instrument(skip(self, req, policy), level = "trace")]
    fn lookup(&mut self, req: &MemReq, update_replacement: bool, policy: &mut dyn ReplPolicy) -> Option<u64> {
        let first = self.set_of(req.line_addr) * self.ways;
        let id = (first..first + self.ways).find(|&id| self.addr[id] == req.line_addr)?;
        if update_replacement {
            policy.update(id as u64, req);
        }
        tracing::trace!(line_addr = req.line_addr, id, "set-assoc hit");
        Some(id as u64)
    }

    #[tracing::instrument(skip(self, req, policy), level = "trace")]
    fn preinsert(&mut self, req: &MemReq, policy: &mut dyn ReplPolicy) -> (u64, u64) {
        let first = self.set_of(req.line_addr) * self.ways;
        let candidates: Vec<Candidate> = (first..first + self.ways).map(|id| Candidate::new(id as u64)).collect();
        let candidate = policy.rank(&candidates);
        self.pending_candidate = Some(candidate);
        let wb_line_addr = self.addr[candidate as usize];
        tracing::debug!(line_addr = req.line_addr, candidate, wb_line_addr, "set-assoc preinsert");
        (candidate, wb_line_addr)
    }

    #[tracing::instrument(skip(self, req, policy), level = "trace")]
    fn postinsert(&mut self, candidate: u64, req: &MemReq, policy: &mut dyn ReplPolicy) {
        if self.pending_candidate != Some(candidate) {
            crate::error::fatal("SetAssocArray::postinsert candidate does not match preinsert result");
        }
        policy.replaced(candidate);
        self.addr[candidate as usize] = req.line_addr;
        policy.update(candidate, req);
        self.pending_candidate = None;
    }
}
