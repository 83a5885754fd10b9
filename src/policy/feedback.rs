//! Expected-Value-of-Admission (EVA) replacement.
//!
//! Each tracked line carries an age bucket, computed by [`GlobalCoarsenedAging`]
//! from how long ago it was last touched. Every `accesses_per_reconfigure`
//! updates, [`Class::reconfigure_eva`] turns the running hit/eviction
//! histogram per age bucket into a rank per age bucket: the expected future
//! value of keeping a line of that age around, net of the opportunity cost
//! of the capacity it occupies. `rank` then just picks the candidate whose
//! current age has the lowest rank.
//!
//! [`FeedbackReplPolicy`] runs a single such class. [`FeedbackReusedReplPolicy`]
//! splits tracking into a reused and a non-reused class and applies a
//! cross-class correction afterward, so that lines which get reused at all
//! are judged by a different age/rank curve than lines that are evicted
//! without ever being touched again.

use crate::config::FeedbackConfig;
use crate::error::ConfigError;
use crate::mem_req::MemReq;
use crate::policy::{Candidate, ReplPolicy};

/// Per-age hit/eviction histograms and the rank curve derived from them.
#[derive(Debug, Clone)]
struct Class {
    hits: Vec<u64>,
    evictions: Vec<u64>,
    ewma_hits: Vec<f64>,
    ewma_evictions: Vec<f64>,
    hit_probability: Vec<f64>,
    expected_lifetime: Vec<f64>,
    opportunity_cost: Vec<f64>,
    ranks: Vec<f64>,
}

impl Class {
    fn new(max_age: usize) -> Self {
        Self {
            hits: vec![0; max_age],
            evictions: vec![0; max_age],
            ewma_hits: vec![0.0; max_age],
            ewma_evictions: vec![0.0; max_age],
            hit_probability: vec![0.0; max_age],
            expected_lifetime: vec![0.0; max_age],
            opportunity_cost: vec![0.0; max_age],
            ranks: vec![0.0; max_age],
        }
    }

    fn max_age(&self) -> usize {
        self.ranks.len()
    }

    /// EWMA-decays the running histograms; called once per reconfigure,
    /// before the counts are reset.
    fn decay(&mut self, ewma_decay: f64) {
        for a in 0..self.max_age() {
            self.ewma_hits[a] = self.ewma_hits[a].mul_add(ewma_decay, self.hits[a] as f64);
            self.ewma_evictions[a] = self.ewma_evictions[a].mul_add(ewma_decay, self.evictions[a] as f64);
        }
    }

    fn reset_counts(&mut self) {
        self.hits.iter_mut().for_each(|h| *h = 0);
        self.evictions.iter_mut().for_each(|e| *e = 0);
    }

    /// The EVA kernel: turns this class's decayed histograms into a rank
    /// per age bucket, given the global `line_gain` (the marginal value of
    /// one line of capacity) and an `age_scaling` function mapping an age
    /// bucket to the time span it covers.
    fn reconfigure_eva(&mut self, line_gain: f64, age_scaling: impl Fn(usize) -> f64) {
        let max_age = self.max_age();
        let mut total_events_above = vec![0.0_f64; max_age + 1];
        let mut total_hits_above = 0.0_f64;
        let mut expected_lifetime_unconditioned = 0.0_f64;

        for a in (0..max_age).rev() {
            let events = self.ewma_hits[a] + self.ewma_evictions[a];
            total_events_above[a] = total_events_above[a + 1] + events;

            if a == max_age - 1 {
                self.hit_probability[a] = if total_events_above[a] > 1e-2 {
                    0.5 * self.ewma_hits[a] / total_events_above[a]
                } else {
                    0.0
                };
                self.expected_lifetime[a] = age_scaling(a);
            } else if total_events_above[a] > 1e-2 {
                self.hit_probability[a] =
                    (0.5 * self.ewma_hits[a] + total_hits_above) / (0.5 * events + total_events_above[a + 1]);
                self.expected_lifetime[a] = ((1.0 / 6.0) * age_scaling(a) * events + expected_lifetime_unconditioned)
                    / (0.5 * events + total_events_above[a + 1]);
            } else {
                self.hit_probability[a] = 0.0;
                self.expected_lifetime[a] = 0.0;
            }

            total_hits_above += self.ewma_hits[a];
            expected_lifetime_unconditioned += age_scaling(a) * total_events_above[a];
        }

        for a in 0..max_age {
            self.opportunity_cost[a] = if line_gain.is_nan() { 0.0 } else { line_gain * self.expected_lifetime[a] };
            self.ranks[a] = self.hit_probability[a] - self.opportunity_cost[a];
        }
    }
}

/// Buckets lines into ages by how long ago they were last touched, on a
/// single shared, periodically-recoarsened time scale.
#[derive(Debug)]
struct GlobalCoarsenedAging {
    now: u64,
    timestamps: Vec<u64>,
    age_scaling: f64,
    max_age: usize,
    wrap_arounds: u64,
}

impl GlobalCoarsenedAging {
    fn new(num_lines: usize, max_age: usize, age_scaling: f64) -> Self {
        Self {
            now: 0,
            timestamps: vec![0; num_lines],
            age_scaling,
            max_age,
            wrap_arounds: 0,
        }
    }

    fn num_lines(&self) -> usize {
        self.timestamps.len()
    }

    fn present(&self, id: usize) -> bool {
        self.timestamps[id] != 0
    }

    fn bucket_span(&self, a: usize) -> f64 {
        if a == 0 {
            self.age_scaling / 2.0 + 0.5
        } else {
            self.age_scaling
        }
    }

    fn update(&mut self, id: usize) {
        self.now += 1;
        let exact = self.now - self.timestamps[id];
        let coarse = (exact as f64 / self.age_scaling) as usize;
        if coarse > self.max_age {
            self.wrap_arounds += 1;
        }
        self.timestamps[id] = self.now;
    }

    fn age(&self, id: usize) -> usize {
        (((self.now - self.timestamps[id]) as f64 / self.age_scaling) as usize) % self.max_age
    }

    /// Resets the per-interval wrap-around count and reports the
    /// age-coarsening scale to use for the next interval.
    ///
    /// `age_scaling` is fixed at construction (see `FeedbackConfig`): this
    /// is a deliberate no-op, matching the original's own `adaptAgeScale()`,
    /// which computes the wrap rate but returns the scale unchanged.
    fn adapt_age_scale(&mut self) -> f64 {
        self.wrap_arounds = 0;
        self.age_scaling
    }
}

fn rank_in_classes(classes: &[Class], aging: &GlobalCoarsenedAging, class_of: impl Fn(u64) -> usize, candidates: &[Candidate]) -> u64 {
    if let Some(absent) = candidates.iter().find(|c| !aging.present(c.line_id as usize)) {
        return absent.line_id;
    }
    let mut best_cand = None;
    let mut best_rank = f64::INFINITY;
    for c in candidates {
        let age = aging.age(c.line_id as usize);
        let rank = classes[class_of(c.line_id)].ranks[age];
        if best_cand.is_none() || rank < best_rank - 1e-3 {
            best_rank = rank;
            best_cand = Some(c.line_id);
        }
    }
    best_cand.unwrap_or_else(|| crate::error::fatal("feedback policy: no eligible candidate"))
}

/// Shared bookkeeping used by both feedback policy variants.
#[derive(Debug)]
struct FeedbackCommon {
    classes: Vec<Class>,
    aging: GlobalCoarsenedAging,
    ewma_decay: f64,
    accesses_per_reconfigure: u64,
    updates_until_reconfigure: u64,
}

impl FeedbackCommon {
    fn new(config: FeedbackConfig, num_classes: usize) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            classes: (0..num_classes).map(|_| Class::new(config.max_age)).collect(),
            aging: GlobalCoarsenedAging::new(config.num_lines, config.max_age, config.age_scaling),
            ewma_decay: config.ewma_decay,
            accesses_per_reconfigure: config.accesses_per_reconfigure,
            updates_until_reconfigure: config.accesses_per_reconfigure,
        })
    }

    fn reconfigure_base(&mut self) {
        for class in &mut self.classes {
            class.decay(self.ewma_decay);
        }
        let total_hits: f64 = self.classes.iter().flat_map(|c| c.ewma_hits.iter()).sum();
        let total_evictions: f64 = self.classes.iter().flat_map(|c| c.ewma_evictions.iter()).sum();
        let line_gain = total_hits / (total_hits + total_evictions) / self.aging.num_lines() as f64;
        let age_scaling = self.aging.age_scaling;
        let max_age = self.aging.max_age;
        for class in &mut self.classes {
            class.reconfigure_eva(line_gain, |a| if a == 0 { age_scaling / 2.0 + 0.5 } else { age_scaling });
            // a saturating age must never rank highest, or the cache gets
            // stuck with every tracked line pinned at max age.
            class.ranks[max_age - 1] = f64::MIN;
        }
        self.aging.age_scaling = self.aging.adapt_age_scale();
    }

    fn reset(&mut self) {
        for class in &mut self.classes {
            class.reset_counts();
        }
    }

    fn tick_and_maybe_reconfigure(&mut self, reconfigure: impl FnOnce(&mut Self)) {
        self.updates_until_reconfigure -= 1;
        if self.updates_until_reconfigure == 0 {
            reconfigure(self);
            self.reset();
            self.updates_until_reconfigure = self.accesses_per_reconfigure;
        }
    }
}

/// EVA with a single tracked class.
#[derive(Debug)]
pub struct FeedbackReplPolicy {
    common: FeedbackCommon,
}

impl FeedbackReplPolicy {
    /// Builds an EVA policy tracking `config.num_lines` lines in a single class.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `config.ewma_decay` is outside `[0, 1)`.
    pub fn new(config: FeedbackConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            common: FeedbackCommon::new(config, 1)?,
        })
    }
}

impl ReplPolicy for FeedbackReplPolicy {
    fn rank(&mut self, candidates: &[Candidate]) -> u64 {
        rank_in_classes(&self.common.classes, &self.common.aging, |_| 0, candidates)
    }

    fn replaced(&mut self, line_id: u64) {
        let id = line_id as usize;
        if self.common.aging.present(id) {
            let age = self.common.aging.age(id);
            self.common.classes[0].evictions[age] += 1;
        }
        self.common.aging.timestamps[id] = 0;
    }

    fn update(&mut self, line_id: u64, _req: &MemReq) {
        let id = line_id as usize;
        if self.common.aging.present(id) {
            let age = self.common.aging.age(id);
            self.common.classes[0].hits[age] += 1;
        }
        self.common.aging.update(id);
        self.common.tick_and_maybe_reconfigure(FeedbackCommon::reconfigure_base);
    }
}

const NONREUSED: usize = 0;
const REUSED: usize = 1;

/// EVA with lines split into a reused and a non-reused class, with a
/// cross-class bias correction applied after the shared kernel runs.
#[derive(Debug)]
pub struct FeedbackReusedReplPolicy {
    common: FeedbackCommon,
    reused: Vec<bool>,
}

impl FeedbackReusedReplPolicy {
    /// Builds an EVA policy tracking `config.num_lines` lines split into
    /// reused and non-reused classes.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `config.ewma_decay` is outside `[0, 1)`.
    pub fn new(config: FeedbackConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            common: FeedbackCommon::new(config, 2)?,
            reused: vec![false; config.num_lines],
        })
    }

    fn class_of(&self, line_id: u64) -> usize {
        if self.reused[line_id as usize] {
            REUSED
        } else {
            NONREUSED
        }
    }

    /// Applies the reused/non-reused cross-class correction described in
    /// this module's docs, after the shared EVA kernel has already run on
    /// both classes independently.
    fn apply_reused_bias(&mut self) {
        let seed = 1.0_f64;
        let reused_hits: f64 = seed + self.common.classes[REUSED].ewma_hits.iter().sum::<f64>();
        let reused_evictions: f64 = seed + self.common.classes[REUSED].ewma_evictions.iter().sum::<f64>();
        let reused_miss_rate = reused_evictions / (reused_hits + reused_evictions);

        let non_reused_hits: f64 = seed + self.common.classes[NONREUSED].ewma_hits.iter().sum::<f64>();
        let non_reused_evictions: f64 = seed + self.common.classes[NONREUSED].ewma_evictions.iter().sum::<f64>();

        let total_hits = reused_hits + non_reused_hits;
        let total_evictions = reused_evictions + non_reused_evictions;
        let average_miss_rate = total_evictions / (total_hits + total_evictions);

        let reused_lifetime_bias = self.common.classes[REUSED].ranks[0];

        for class in &mut self.common.classes {
            for a in 0..class.max_age() {
                class.ranks[a] += (average_miss_rate - (1.0 - class.hit_probability[a])) / reused_miss_rate * reused_lifetime_bias;
            }
        }
    }
}

impl ReplPolicy for FeedbackReusedReplPolicy {
    fn rank(&mut self, candidates: &[Candidate]) -> u64 {
        let reused = &self.reused;
        rank_in_classes(
            &self.common.classes,
            &self.common.aging,
            |line_id| if reused[line_id as usize] { REUSED } else { NONREUSED },
            candidates,
        )
    }

    fn replaced(&mut self, line_id: u64) {
        let id = line_id as usize;
        if self.common.aging.present(id) {
            let age = self.common.aging.age(id);
            let class = self.class_of(line_id);
            self.common.classes[class].evictions[age] += 1;
        }
        self.common.aging.timestamps[id] = 0;
        self.reused[id] = false;
    }

    fn update(&mut self, line_id: u64, _req: &MemReq) {
        let id = line_id as usize;
        if self.common.aging.present(id) {
            let age = self.common.aging.age(id);
            let class = self.class_of(line_id);
            self.common.classes[class].hits[age] += 1;
            self.reused[id] = true;
        }
        self.common.aging.update(id);
        let about_to_reconfigure = self.common.updates_until_reconfigure == 1;
        self.common.tick_and_maybe_reconfigure(FeedbackCommon::reconfigure_base);
        if about_to_reconfigure {
            self.apply_reused_bias();
        }
    }
}
