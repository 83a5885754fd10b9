//! Construction-time configuration errors.
//!
//! Everything that can go wrong once an array or policy is already running
//! (a broken sharing-list invariant, an unranked candidate set, a line
//! address of zero reaching the zcache) is a programming-contract violation,
//! not a recoverable error: those sites log via [`tracing::error!`] and then
//! panic, matching the fatal `panic()`/`assert_msg` calls of the simulator
//! this crate's arrays are modeled on. Only sizing problems caught when an
//! array or policy is *built* are reported as [`ConfigError`], since the
//! caller can reasonably reject a bad config instead of aborting.

use thiserror::Error;

/// A configuration value failed validation at construction time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The number of sets implied by `num_lines / assoc` (or `/ ways`) is not a power of two.
    #[error("number of sets must be a power of two, got {0}")]
    SetCountNotPowerOfTwo(usize),

    /// A zcache was configured with fewer than two ways.
    #[error("zcache arrays need at least 2 ways, got {0}")]
    WaysBelowMinimum(usize),

    /// A zcache was configured with `cands < ways`.
    #[error("zcache candidate count ({cands}) must be >= ways ({ways})")]
    CandsBelowWays {
        /// Configured candidate count.
        cands: usize,
        /// Configured way count.
        ways: usize,
    },

    /// `num_lines` is not evenly divisible by `ways`.
    #[error("num_lines ({num_lines}) is not a multiple of ways ({ways})")]
    LinesNotMultipleOfWays {
        /// Configured line count.
        num_lines: usize,
        /// Configured way count.
        ways: usize,
    },

    /// An EWMA decay factor outside `[0, 1)` was supplied.
    #[error("ewma_decay must be in [0, 1), got {0}")]
    EwmaDecayOutOfRange(f64),
}

/// Logs `message` at error level, then panics with the same message.
///
/// Used at every in-operation contract-violation site named in the crate's
/// error handling design, so the tracing event and the panic text never
/// drift apart.
#[track_caller]
pub(crate) fn fatal(message: impl AsRef<str>) -> ! {
    let message = message.as_ref();
    tracing::error!("{message}");
    panic!("{message}");
}
