//! Replacement policies: given a set of eviction candidates an array has
//! gathered, choose one to evict, and stay informed of hits and
//! installations so future choices can improve.
//!
//! Unlike the simulator this crate is modeled on, where a policy ranks
//! `(set, way)` pairs because every array was set-associative, this crate's
//! arrays (set-associative, zcache, sparse) all converge on a flat line id
//! space, so [`ReplPolicy`] ranks and is notified about line ids directly.
//! This is a deliberate generalization: it lets the same policy
//! implementation drive any of the three array shapes.

pub mod feedback;
pub mod fifo;
pub mod hawkeye;
pub mod lru;
pub mod random;

use crate::config::{FeedbackConfig, HawkeyeConfig, ReplacementPolicyKind};
use crate::error::ConfigError;
use crate::mem_req::MemReq;

/// A candidate line id offered up for ranking, carrying whatever extra
/// context a policy needs to break ties (its owning domain, for the
/// partitioned zcache; nothing extra for the plain arrays).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// The line id a policy can choose to evict.
    pub line_id: u64,
}

impl Candidate {
    /// Builds a bare candidate around a line id.
    #[must_use]
    pub fn new(line_id: u64) -> Self {
        Self { line_id }
    }
}

/// The interface every replacement policy implements.
///
/// An array calls `rank` during `preinsert` to choose among the candidates
/// it gathered, `replaced` once it has evicted the chosen line (before the
/// new line lands), and `update` once the new line has been installed (or,
/// on a hit, right after `lookup` succeeds).
pub trait ReplPolicy {
    /// Chooses the best eviction candidate from `candidates`, returning its
    /// line id. `candidates` is never empty.
    fn rank(&mut self, candidates: &[Candidate]) -> u64;

    /// Notifies the policy that `line_id` is about to be evicted.
    fn replaced(&mut self, line_id: u64);

    /// Notifies the policy that `line_id` now holds `req`'s line, or that
    /// `line_id` was just accessed again on a hit.
    fn update(&mut self, line_id: u64, req: &MemReq);
}

/// Builds the policy named by `kind`, drawing whichever of `feedback` /
/// `hawkeye` / `line_size` it actually needs.
///
/// Mirrors the teacher crate's `CacheSim::new`, which matches on a
/// `ReplacementPolicy` config enum and boxes up the corresponding concrete
/// policy; the two EVA variants and Hawkeye can fail construction-time
/// validation, so this returns a `Result` rather than an infallible `Box`.
///
/// # Errors
/// Returns a [`ConfigError`] if `feedback` or `hawkeye` fails validation for
/// the variant `kind` selects; the configuration not selected is never
/// validated.
pub fn build(
    kind: ReplacementPolicyKind,
    feedback: FeedbackConfig,
    hawkeye: HawkeyeConfig,
    line_size: usize,
) -> Result<Box<dyn ReplPolicy>, ConfigError> {
    Ok(match kind {
        ReplacementPolicyKind::Lru => Box::new(lru::LruPolicy::new()),
        ReplacementPolicyKind::Fifo => Box::new(fifo::FifoPolicy::new()),
        ReplacementPolicyKind::Random => Box::new(random::RandomPolicy::new()),
        ReplacementPolicyKind::Feedback => Box::new(feedback::FeedbackReplPolicy::new(feedback)?),
        ReplacementPolicyKind::FeedbackReused => Box::new(feedback::FeedbackReusedReplPolicy::new(feedback)?),
        ReplacementPolicyKind::Hawkeye => Box::new(hawkeye::HawkeyePolicy::new(hawkeye, line_size)?),
    })
}
