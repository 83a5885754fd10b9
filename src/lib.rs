//! Associative cache array layer: the array shapes and replacement policies
//! that sit underneath a cache simulator's line-lookup path.
//!
//! This crate implements:
//! 1. **Arrays:** conventional N-way [`array::set_assoc::SetAssocArray`], the
//!    skewed-associative [`array::zcache::ZArray`] (with BFS relocation) and
//!    its domain-partitioned sibling [`array::zcache::PartitionedZArray`],
//!    and the deduplicating [`array::sparse::tag_array::SparseTagArray`] /
//!    [`array::sparse::data_array::SparseDataArray`] pair.
//! 2. **Replacement policies:** LRU, FIFO, random, the EVA-based
//!    [`policy::feedback`] family, and [`policy::hawkeye`].
//! 3. **Configuration:** deserializable, validated config structs for every
//!    array and policy (see [`config`]).
//! 4. **Hashing:** a shared [`hash::HashFamily`] so every way of an array
//!    (or every array sharing a hierarchy) can derive independent but
//!    reproducible set indices from the same line address.
//!
//! Every array implements the three-call contract in [`array::CacheArray`]
//! (the sparse pair aside, whose extra parameters don't fit that shape);
//! every policy implements [`policy::ReplPolicy`]. Arrays and policies are
//! deliberately decoupled: any policy can drive any array, since policies
//! rank and track plain line ids rather than `(set, way)` pairs.

/// Cache array implementations: the contract every array type implements,
/// plus the set-associative, zcache and sparse tag/data variants.
pub mod array;
/// Deserializable configuration for every array and replacement policy.
pub mod config;
/// Error types, including the fatal-contract-violation helper arrays use
/// when a caller breaks the `preinsert`/`postinsert` protocol.
pub mod error;
/// Shared, reproducible hash families used to derive per-way set indices.
pub mod hash;
/// The memory request type arrays and policies are given on every access.
pub mod mem_req;
/// Replacement policies: rank eviction candidates and track access history.
pub mod policy;
/// A small monotonically-increasing access counter shared across this
/// crate's policies.
pub mod stats;

pub use crate::array::CacheArray;
pub use crate::error::ConfigError;
pub use crate::hash::{HashFamily, SharedHashFamily};
pub use crate::mem_req::MemReq;
pub use crate::policy::{Candidate, ReplPolicy};
