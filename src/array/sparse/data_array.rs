//! The data half of the sparse array pair: a set-associative array of
//! deduplicated content fingerprints, each entry pointing at the head of the
//! tag sharing list that references it.

use crate::config::SetAssocConfig;
use crate::error::ConfigError;
use crate::mem_req::MemReq;
use crate::policy::{Candidate, ReplPolicy};

/// A line's contents, interpreted as a homogeneous array of one numeric
/// type, the way an annotated approximate region is interpreted when its
/// fingerprint is computed.
#[derive(Debug, Clone)]
pub enum LineElements {
    /// Unsigned 8-bit elements.
    Uint8(Vec<u8>),
    /// Signed 8-bit elements.
    Int8(Vec<i8>),
    /// Unsigned 16-bit elements.
    Uint16(Vec<u16>),
    /// Signed 16-bit elements.
    Int16(Vec<i16>),
    /// Unsigned 32-bit elements.
    Uint32(Vec<u32>),
    /// Signed 32-bit elements.
    Int32(Vec<i32>),
    /// Unsigned 64-bit elements.
    Uint64(Vec<u64>),
    /// Signed 64-bit elements.
    Int64(Vec<i64>),
    /// 32-bit floating point elements.
    Float(Vec<f32>),
    /// 64-bit floating point elements.
    Double(Vec<f64>),
}

impl LineElements {
    fn as_f64(&self) -> (Vec<f64>, bool, u32) {
        match self {
            Self::Uint8(v) => (v.iter().map(|&x| f64::from(x)).collect(), true, 8),
            Self::Int8(v) => (v.iter().map(|&x| f64::from(x)).collect(), true, 8),
            Self::Uint16(v) => (v.iter().map(|&x| f64::from(x)).collect(), true, 16),
            Self::Int16(v) => (v.iter().map(|&x| f64::from(x)).collect(), true, 16),
            Self::Uint32(v) => (v.iter().map(|&x| f64::from(x)).collect(), true, 32),
            Self::Int32(v) => (v.iter().map(|&x| f64::from(x)).collect(), true, 32),
            Self::Uint64(v) => (v.iter().map(|&x| x as f64).collect(), true, 64),
            Self::Int64(v) => (v.iter().map(|&x| x as f64).collect(), true, 64),
            Self::Float(v) => (v.iter().map(|&x| f64::from(x)).collect(), false, 32),
            Self::Double(v) => (v.clone(), false, 64),
        }
    }
}

/// Computes a packed average/range fingerprint for `elements`, given the
/// annotated value range the caller promises the data stays within.
///
/// Integer elements outside `[annotated_min, annotated_max]` are a
/// programming error in the annotation and are treated as fatal; float
/// elements outside the range are only ever approximate by nature, so they
/// are logged and clamped into the fingerprint rather than aborting.
///
/// The low `map_size` bits of the result hold the quantized average; the
/// next `map_size / 2` bits hold the quantized range.
#[must_use]
pub fn compute_map(elements: &LineElements, map_size: u32, annotated_min: f64, annotated_max: f64) -> u64 {
    let (values, is_integer, elem_bits) = elements.as_f64();

    let mut sum = 0.0_f64;
    let mut max = f64::MIN;
    let mut min = f64::MAX;
    for &v in &values {
        if v > annotated_max || v < annotated_min {
            if is_integer {
                crate::error::fatal(format!(
                    "approximate data value {v} outside annotated range [{annotated_min}, {annotated_max}]"
                ));
            } else {
                tracing::warn!(
                    value = v,
                    min = annotated_min,
                    max = annotated_max,
                    "approximate float value outside annotated range"
                );
            }
        }
        sum += v;
        max = max.max(v);
        min = min.min(v);
    }
    let count = values.len().max(1) as f64;
    let avg = sum / count;
    let range = max - min;

    // byte-wide integer types keep their raw avg/range when the map is wide
    // enough to hold them unscaled; everything else is quantized into
    // map_size steps spanning the annotated range.
    let (avg_q, range_q) = if is_integer && elem_bits <= 8 && map_size > elem_bits {
        (avg, range)
    } else {
        let steps = 2_f64.powi(i32::try_from(map_size.saturating_sub(1)).unwrap_or(31));
        let map_step = (annotated_max - annotated_min) / steps;
        if map_step.abs() < f64::EPSILON {
            (0.0, 0.0)
        } else {
            (avg / map_step, range / map_step)
        }
    };

    pack(avg_q as i64, range_q as i64, map_size)
}

fn pack(avg: i64, range: i64, map_size: u32) -> u64 {
    let avg_bits = map_size.max(1);
    let range_bits = map_size / 2;
    let avg_mask = (1_u64 << avg_bits) - 1;
    let range_mask = if range_bits == 0 { 0 } else { (1_u64 << range_bits) - 1 };
    let avg_map = (avg as u64) & avg_mask;
    let range_map = (range as u64) & range_mask;
    avg_map | (range_map << avg_bits)
}

/// A set-associative array of deduplicated content fingerprints.
#[derive(Debug)]
pub struct SparseDataArray {
    ways: usize,
    num_sets: usize,
    map: Vec<u64>,
    approximate: Vec<bool>,
    list_head: Vec<i64>,
    valid_lines: usize,
    pending_candidate: Option<usize>,
}

impl SparseDataArray {
    /// Builds a data array per `config`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `config` doesn't validate (see
    /// [`SetAssocConfig::validate`]).
    pub fn new(config: SetAssocConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ways: config.ways,
            num_sets: config.num_sets(),
            map: vec![0; config.num_lines],
            approximate: vec![false; config.num_lines],
            list_head: vec![-1; config.num_lines],
            valid_lines: 0,
            pending_candidate: None,
        })
    }

    fn set_of(&self, map_value: u64) -> usize {
        (map_value as usize) & (self.num_sets - 1)
    }

    /// Returns the data id already holding `map_value`, if any.
    ///
    /// Only entries marked `approximate` are considered: an exact (unshared)
    /// line is addressed by its tag's `map_id` pointer, never by fingerprint,
    /// so a fingerprint collision against an exact entry must not be treated
    /// as a hit. See this crate's design notes on the asymmetry. An entry no
    /// tag currently references (`list_head == -1`) is not a hit either, the
    /// same emptiness test `valid_lines` is kept under.
    #[must_use]
    pub fn lookup(&self, map_value: u64) -> Option<u64> {
        let set = self.set_of(map_value);
        (0..self.ways)
            .map(|w| set * self.ways + w)
            .find(|&id| self.list_head[id] != -1 && self.approximate[id] && self.map[id] == map_value)
            .map(|id| id as u64)
    }

    /// Gathers the set's entries as candidates and ranks them via `policy`,
    /// returning `(candidate_data_id, evicted_map_value, evicted_list_head)`.
    pub fn preinsert(&mut self, map_value: u64, policy: &mut dyn ReplPolicy) -> (u64, u64, i64) {
        let set = self.set_of(map_value);
        let candidates: Vec<Candidate> = (0..self.ways).map(|w| Candidate::new((set * self.ways + w) as u64)).collect();
        let victim = policy.rank(&candidates);
        self.pending_candidate = Some(victim as usize);
        (victim, self.map[victim as usize], self.list_head[victim as usize])
    }

    /// Commits `map_value` into the data slot chosen by `preinsert`, with
    /// its sharing list rooted at `list_head`.
    pub fn postinsert(&mut self, data_id: u64, req: &MemReq, map_value: u64, approximate: bool, list_head: i64, policy: &mut dyn ReplPolicy) {
        if self.pending_candidate != Some(data_id as usize) {
            crate::error::fatal("SparseDataArray::postinsert candidate does not match preinsert result");
        }
        let id = data_id as usize;
        let had_tags = self.list_head[id] != -1;
        policy.replaced(data_id);
        self.map[id] = map_value;
        self.approximate[id] = approximate;
        self.list_head[id] = list_head;
        match (had_tags, list_head != -1) {
            (false, true) => self.valid_lines += 1,
            (true, false) => self.valid_lines -= 1,
            _ => {}
        }
        policy.update(data_id, req);
        self.pending_candidate = None;
    }

    /// Updates which tag heads `data_id`'s sharing list without otherwise
    /// disturbing the entry, keeping `valid_lines` under the same
    /// empty↔nonempty discipline `postinsert` uses.
    pub fn change_in_place(&mut self, data_id: u64, list_head: i64) {
        let id = data_id as usize;
        let had_tags = self.list_head[id] != -1;
        self.list_head[id] = list_head;
        match (had_tags, list_head != -1) {
            (false, true) => self.valid_lines += 1,
            (true, false) => self.valid_lines -= 1,
            _ => {}
        }
    }

    /// The tag id heading `data_id`'s sharing list, or `-1`.
    #[must_use]
    pub fn read_list_head(&self, data_id: u64) -> i64 {
        self.list_head[data_id as usize]
    }

    /// The fingerprint stored at `data_id`.
    #[must_use]
    pub fn read_map(&self, data_id: u64) -> u64 {
        self.map[data_id as usize]
    }

    /// Number of occupied data entries.
    #[must_use]
    pub fn valid_lines(&self) -> usize {
        self.valid_lines
    }
}
