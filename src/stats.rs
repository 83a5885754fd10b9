//! Minimal stat counters exposed by arrays.
//!
//! Aggregating these into a wider statistics hierarchy (periodic dumps,
//! named trees of counters) is explicitly out of scope for this crate; what
//! remains is the leaf counter type itself, since [`crate::array::zcache::ZArray`]
//! needs somewhere to record swap counts.

/// A monotonically increasing named count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter(u64);

impl Counter {
    /// Creates a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    /// Increments the counter by `n`.
    pub fn inc(&mut self, n: u64) {
        self.0 += n;
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0
    }
}
