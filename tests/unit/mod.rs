//! Integration tests mirroring `src/array` and `src/policy`.

/// End-to-end array scenarios: fills, relocations, sharing, partitioning.
pub mod array;

/// End-to-end replacement-policy scenarios: EVA saturation, Hawkeye pressure.
pub mod policy;
