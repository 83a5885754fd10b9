//! Deserializable configuration for every array and replacement policy in
//! this crate.
//!
//! Every knob follows the same pattern used throughout this crate's
//! configuration layer: a `defaults` module holding named constants, and a
//! config struct whose fields each carry `#[serde(default = "...")]` pointed
//! at a small `default_*` function, so a JSON document can override exactly
//! the fields it cares about and leave the rest at their documented default.
//!
//! ```
//! use assoc_cache::config::SetAssocConfig;
//!
//! let json = r#"{ "num_lines": 1024, "ways": 8 }"#;
//! let cfg: SetAssocConfig = serde_json::from_str(json).unwrap();
//! assert_eq!(cfg.num_lines, 1024);
//! assert_eq!(cfg.ways, 8);
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

/// Named default values for every config field in this module.
pub mod defaults {
    /// Default cache line size in bytes.
    pub const LINE_SIZE: usize = 64;
    /// Default fingerprint width, in bits, for [`super::SparseConfig`].
    pub const MAP_SIZE: u32 = 8;
    /// Default associativity for [`super::SetAssocConfig`].
    pub const WAYS: usize = 4;
    /// Default candidate count for [`super::ZCacheConfig`].
    pub const CANDS: usize = 16;
    /// Default max age bucket count for aging-based policies.
    pub const MAX_AGE: usize = 128;
    /// Default initial age-coarsening scale.
    pub const AGE_SCALING: f64 = 1.0;
    /// Default number of updates between EVA reconfigurations.
    pub const ACCESSES_PER_RECONFIGURE: u64 = 1 << 16;
    /// Default EWMA decay factor applied to per-age hit/eviction histograms.
    pub const EWMA_DECAY: f64 = 0.8;
    /// Default warm-up threshold fraction for partitioned-zcache domain
    /// eligibility (a domain stays eligible for empty slots until its line
    /// count reaches `num_lines / WARMUP_DIVISOR`).
    pub const WARMUP_DIVISOR: usize = 2;
}

/// Fields shared by every array kind: the line size and, for sparse arrays,
/// the data fingerprint width.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Cache line size in bytes, used to derive offset-bit counts.
    #[serde(default = "default_line_size")]
    pub line_size: usize,
    /// Width, in bits, of a sparse array's packed avg/range fingerprint.
    #[serde(default = "default_map_size")]
    pub map_size: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            line_size: defaults::LINE_SIZE,
            map_size: defaults::MAP_SIZE,
        }
    }
}

fn default_line_size() -> usize {
    defaults::LINE_SIZE
}

fn default_map_size() -> u32 {
    defaults::MAP_SIZE
}

/// Configuration for a plain set-associative array.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SetAssocConfig {
    /// Total number of lines held by the array.
    pub num_lines: usize,
    /// Associativity: lines per set.
    #[serde(default = "default_ways")]
    pub ways: usize,
}

fn default_ways() -> usize {
    defaults::WAYS
}

impl SetAssocConfig {
    /// Validates that `num_lines` is a multiple of `ways` and that the
    /// resulting set count is a power of two.
    pub fn validate(self) -> Result<(), ConfigError> {
        if self.num_lines % self.ways != 0 {
            return Err(ConfigError::LinesNotMultipleOfWays {
                num_lines: self.num_lines,
                ways: self.ways,
            });
        }
        let num_sets = self.num_lines / self.ways;
        if !num_sets.is_power_of_two() {
            return Err(ConfigError::SetCountNotPowerOfTwo(num_sets));
        }
        Ok(())
    }

    /// Number of sets implied by `num_lines / ways`.
    #[must_use]
    pub fn num_sets(self) -> usize {
        self.num_lines / self.ways
    }
}

/// Configuration for a zcache (skewed-associative) array.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ZCacheConfig {
    /// Total number of lines held by the array.
    pub num_lines: usize,
    /// Number of independent ways, each with its own lookup table.
    #[serde(default = "default_ways")]
    pub ways: usize,
    /// Number of candidates to gather via the BFS relocation walk before
    /// ranking, per `preinsert`.
    #[serde(default = "default_cands")]
    pub cands: usize,
}

fn default_cands() -> usize {
    defaults::CANDS
}

impl ZCacheConfig {
    /// Validates way count, candidate count, and set-count power-of-two.
    pub fn validate(self) -> Result<(), ConfigError> {
        if self.ways < 2 {
            return Err(ConfigError::WaysBelowMinimum(self.ways));
        }
        if self.cands < self.ways {
            return Err(ConfigError::CandsBelowWays {
                cands: self.cands,
                ways: self.ways,
            });
        }
        if self.num_lines % self.ways != 0 {
            return Err(ConfigError::LinesNotMultipleOfWays {
                num_lines: self.num_lines,
                ways: self.ways,
            });
        }
        let num_sets = self.num_lines / self.ways;
        if !num_sets.is_power_of_two() {
            return Err(ConfigError::SetCountNotPowerOfTwo(num_sets));
        }
        Ok(())
    }

    /// Number of sets per way.
    #[must_use]
    pub fn num_sets(self) -> usize {
        self.num_lines / self.ways
    }
}

/// Configuration for the sparse tag/data array pair.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SparseConfig {
    /// Number of tag entries (one per cache line slot).
    pub num_tags: usize,
    /// Associativity of the tag array.
    #[serde(default = "default_ways")]
    pub tag_ways: usize,
    /// Number of distinct data entries (deduplicated fingerprints).
    pub num_data: usize,
    /// Associativity of the data array.
    #[serde(default = "default_ways")]
    pub data_ways: usize,
}

impl SparseConfig {
    /// Validates both the tag and data array set counts.
    pub fn validate(self) -> Result<(), ConfigError> {
        SetAssocConfig {
            num_lines: self.num_tags,
            ways: self.tag_ways,
        }
        .validate()?;
        SetAssocConfig {
            num_lines: self.num_data,
            ways: self.data_ways,
        }
        .validate()
    }
}

/// The numeric element type a line's data is interpreted as when computing
/// its approximate fingerprint.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// Unsigned 8-bit integer elements.
    Uint8,
    /// Signed 8-bit integer elements.
    Int8,
    /// Unsigned 16-bit integer elements.
    Uint16,
    /// Signed 16-bit integer elements.
    Int16,
    /// Unsigned 32-bit integer elements.
    Uint32,
    /// Signed 32-bit integer elements.
    Int32,
    /// Unsigned 64-bit integer elements.
    Uint64,
    /// Signed 64-bit integer elements.
    Int64,
    /// 32-bit floating point elements.
    Float,
    /// 64-bit floating point elements.
    Double,
}

/// Which replacement policy kind a caller wants constructed.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ReplacementPolicyKind {
    /// Least-recently-used, tracked per line id.
    #[serde(alias = "lru")]
    Lru,
    /// First-in-first-out insertion order.
    #[serde(alias = "fifo")]
    Fifo,
    /// Uniform random victim selection.
    #[serde(alias = "random")]
    Random,
    /// Expected-Value-of-Admission feedback policy, single class.
    #[serde(alias = "feedback", alias = "eva")]
    Feedback,
    /// Expected-Value-of-Admission feedback policy with a reused/non-reused
    /// class split.
    #[serde(alias = "feedback_reused", alias = "eva_reused")]
    FeedbackReused,
    /// Hawkeye's OPT-gen-driven predictor and RRIP eviction.
    #[serde(alias = "hawkeye")]
    Hawkeye,
}

/// Which aging strategy a feedback policy uses to bucket lines by age.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum AgingKind {
    /// A single coarsening scale shared by every line, periodically adapted.
    #[default]
    #[serde(alias = "global_coarsened")]
    GlobalCoarsened,
}

/// Configuration for the EVA-based feedback replacement policies.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct FeedbackConfig {
    /// Number of lines the policy is tracking ages for.
    pub num_lines: usize,
    /// Number of age buckets.
    #[serde(default = "default_max_age")]
    pub max_age: usize,
    /// Initial age-coarsening scale.
    #[serde(default = "default_age_scaling")]
    pub age_scaling: f64,
    /// Updates between successive `reconfigure` calls.
    #[serde(default = "default_accesses_per_reconfigure")]
    pub accesses_per_reconfigure: u64,
    /// EWMA decay applied to per-age hit/eviction histograms each reconfigure.
    #[serde(default = "default_ewma_decay")]
    pub ewma_decay: f64,
    /// Whether to split tracking into reused/non-reused classes
    /// ([`ReplacementPolicyKind::FeedbackReused`]) or keep a single class.
    #[serde(default)]
    pub reused_split: bool,
    /// Aging strategy to use.
    #[serde(default)]
    pub aging: AgingKind,
}

fn default_max_age() -> usize {
    defaults::MAX_AGE
}

fn default_age_scaling() -> f64 {
    defaults::AGE_SCALING
}

fn default_accesses_per_reconfigure() -> u64 {
    defaults::ACCESSES_PER_RECONFIGURE
}

fn default_ewma_decay() -> f64 {
    defaults::EWMA_DECAY
}

impl FeedbackConfig {
    /// Validates the EWMA decay factor is within `[0, 1)`.
    pub fn validate(self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.ewma_decay) {
            return Err(ConfigError::EwmaDecayOutOfRange(self.ewma_decay));
        }
        Ok(())
    }
}

/// Configuration for the Hawkeye replacement policy.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HawkeyeConfig {
    /// Number of sets in the array this policy is driving.
    pub num_sets: usize,
    /// Associativity (ways) of the array this policy is driving.
    pub ways: usize,
}

impl HawkeyeConfig {
    /// Validates that `num_sets` is a power of two, matching every other
    /// array/policy config in this module.
    pub fn validate(self) -> Result<(), ConfigError> {
        if !self.num_sets.is_power_of_two() {
            return Err(ConfigError::SetCountNotPowerOfTwo(self.num_sets));
        }
        Ok(())
    }
}

/// Domain-eligibility warm-up configuration for a partitioned zcache.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PartitionConfig {
    /// Number of distinct requester domains to track eligibility counters for.
    pub num_domains: usize,
}
