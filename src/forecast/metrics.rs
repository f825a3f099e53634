//! Bounded personal metrics.
//!
//! Every metric lives in a fixed domain `[min, max]` with a recording step. The
//! [`MetricVector`] is a dense array indexed by [`MetricId`] and never stores a
//! value outside its domain: every constructor and mutator clamps, and
//! non-finite inputs are replaced by the domain's neutral value.
//!
//! # Polarity
//!
//! `stress` is the only "lower is better" metric. Goodness scores in `[0, 1]`
//! (used by the classifier and the life index) invert it.
//!
//! | Metric | Domain | Goodness |
//! |--------|--------|----------|
//! | energy, focus, mood, social, productivity, health | 0–10 | linear |
//! | stress | 0–10 | inverted linear |
//! | sleepHours | 0–14 | peaks at 8h: `1 - |h - 8| / 6` |
//! | cashFlow | ±10 000 | `0.5 + 0.5·tanh(cash / 2000)` |

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Number of tracked metrics.
pub const NUM_METRICS: usize = 9;

/// Sleep duration with maximal goodness (hours).
const IDEAL_SLEEP_HOURS: f64 = 8.0;
/// Distance from the ideal at which sleep goodness reaches zero.
const SLEEP_TOLERANCE_HOURS: f64 = 6.0;
/// Cash flow scale for the tanh goodness curve.
const CASH_SCALE: f64 = 2000.0;
/// Default goal target for the life index.
const DEFAULT_TARGET_INDEX: f64 = 75.0;

/// Identifier of a tracked metric.
///
/// Declaration order is the canonical dense-array order. Lexical order (used for
/// deterministic tie-breaks) is the order of [`MetricId::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricId {
    Energy,
    Focus,
    Mood,
    Stress,
    SleepHours,
    Social,
    Productivity,
    Health,
    CashFlow,
}

impl MetricId {
    /// All metrics in canonical order.
    pub const ALL: [MetricId; NUM_METRICS] = [
        MetricId::Energy,
        MetricId::Focus,
        MetricId::Mood,
        MetricId::Stress,
        MetricId::SleepHours,
        MetricId::Social,
        MetricId::Productivity,
        MetricId::Health,
        MetricId::CashFlow,
    ];

    /// Dense array slot.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Serialized id.
    pub const fn as_str(self) -> &'static str {
        match self {
            MetricId::Energy => "energy",
            MetricId::Focus => "focus",
            MetricId::Mood => "mood",
            MetricId::Stress => "stress",
            MetricId::SleepHours => "sleepHours",
            MetricId::Social => "social",
            MetricId::Productivity => "productivity",
            MetricId::Health => "health",
            MetricId::CashFlow => "cashFlow",
        }
    }

    /// Compare by serialized id.
    pub fn lexical_cmp(&self, other: &MetricId) -> Ordering {
        self.as_str().cmp(other.as_str())
    }

    /// Value domain of this metric.
    pub const fn domain(self) -> MetricDomain {
        match self {
            MetricId::SleepHours => MetricDomain::new(0.0, 14.0, 0.25),
            MetricId::CashFlow => MetricDomain::new(-10_000.0, 10_000.0, 10.0),
            _ => MetricDomain::new(0.0, 10.0, 0.5),
        }
    }

    /// Daily noise sigma before the noise multiplier. Larger for the unbounded metric.
    pub const fn noise_sigma(self) -> f64 {
        match self {
            MetricId::SleepHours => 0.4,
            MetricId::CashFlow => 250.0,
            _ => 0.6,
        }
    }

    /// Whether a higher raw value is better.
    pub const fn higher_is_better(self) -> bool {
        !matches!(self, MetricId::Stress)
    }

    /// Neutral value used to fill missing readings.
    pub const fn neutral(self) -> f64 {
        match self {
            MetricId::SleepHours => 7.0,
            MetricId::CashFlow => 0.0,
            _ => 5.0,
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown metric '{s}'"))
    }
}

/// Domain of a single metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDomain {
    pub min: f64,
    pub max: f64,
    /// Recording resolution
    pub step: f64,
}

impl MetricDomain {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Clamp into the domain. NaN maps to the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    /// Round to the recording step, then clamp.
    pub fn snap(&self, value: f64) -> f64 {
        if self.step <= 0.0 {
            return self.clamp(value);
        }
        self.clamp((value / self.step).round() * self.step)
    }

    /// Position within the domain in `[0, 1]`.
    pub fn unit(&self, value: f64) -> f64 {
        ((self.clamp(value) - self.min) / self.span()).clamp(0.0, 1.0)
    }
}

/// Sparse per-metric deltas (impulses, shocks, effect payloads).
pub type MetricDeltas = BTreeMap<MetricId, f64>;

/// Dense vector of bounded metric values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricVector {
    values: [f64; NUM_METRICS],
}

impl Default for MetricVector {
    fn default() -> Self {
        Self::neutral()
    }
}

impl MetricVector {
    /// Vector with every metric at its neutral value.
    pub fn neutral() -> Self {
        let mut values = [0.0; NUM_METRICS];
        for id in MetricId::ALL {
            values[id.index()] = id.neutral();
        }
        Self { values }
    }

    /// Build from raw values in canonical order, clamping each into its domain.
    pub fn from_array(raw: [f64; NUM_METRICS]) -> Self {
        let mut v = Self::neutral();
        for id in MetricId::ALL {
            v.set(id, raw[id.index()]);
        }
        v
    }

    /// Build from named readings; missing metrics take their neutral value.
    pub fn from_readings<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = (MetricId, f64)>,
    {
        let mut v = Self::neutral();
        for (id, value) in readings {
            v.set(id, value);
        }
        v
    }

    pub fn get(&self, id: MetricId) -> f64 {
        self.values[id.index()]
    }

    /// Set a value, clamped into the domain. Non-finite values reset to neutral.
    pub fn set(&mut self, id: MetricId, value: f64) {
        let v = if value.is_finite() {
            id.domain().clamp(value)
        } else {
            id.neutral()
        };
        self.values[id.index()] = v;
    }

    /// Builder-style set.
    pub fn with(mut self, id: MetricId, value: f64) -> Self {
        self.set(id, value);
        self
    }

    /// Add a delta and clamp.
    pub fn add(&mut self, id: MetricId, delta: f64) {
        if delta.is_finite() {
            self.set(id, self.get(id) + delta);
        }
    }

    /// Apply sparse deltas and clamp each touched metric.
    pub fn apply(&mut self, deltas: &MetricDeltas) {
        for (&id, &delta) in deltas {
            self.add(id, delta);
        }
    }

    /// Raw values in canonical order.
    pub fn values(&self) -> &[f64; NUM_METRICS] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricId, f64)> + '_ {
        MetricId::ALL.iter().map(move |&id| (id, self.get(id)))
    }

    /// Goodness score of one metric in `[0, 1]`.
    pub fn goodness(&self, id: MetricId) -> f64 {
        let value = self.get(id);
        let score = match id {
            MetricId::SleepHours => {
                1.0 - (value - IDEAL_SLEEP_HOURS).abs() / SLEEP_TOLERANCE_HOURS
            }
            MetricId::CashFlow => 0.5 + 0.5 * (value / CASH_SCALE).tanh(),
            MetricId::Stress => 1.0 - id.domain().unit(value),
            _ => id.domain().unit(value),
        };
        score.clamp(0.0, 1.0)
    }

    /// Day-level life index in `[0, 100]`.
    ///
    /// Weighted mean of goodness scores; uniform weights when no goal is given
    /// or the goal's weights sum to zero.
    pub fn life_index(&self, goal: Option<&GoalWeights>) -> f64 {
        let mut num = 0.0;
        let mut den = 0.0;
        for id in MetricId::ALL {
            let w = goal.map_or(1.0, |g| g.weight(id));
            num += w * self.goodness(id);
            den += w;
        }
        if den <= 0.0 {
            return self.life_index(None);
        }
        (100.0 * num / den).clamp(0.0, 100.0)
    }

    /// Per-metric difference `self - other`.
    pub fn diff(&self, other: &MetricVector) -> [f64; NUM_METRICS] {
        let mut out = [0.0; NUM_METRICS];
        for id in MetricId::ALL {
            out[id.index()] = self.get(id) - other.get(id);
        }
        out
    }
}

impl Index<MetricId> for MetricVector {
    type Output = f64;

    fn index(&self, id: MetricId) -> &f64 {
        &self.values[id.index()]
    }
}

impl Serialize for MetricVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(NUM_METRICS))?;
        for (id, value) in self.iter() {
            map.serialize_entry(&id, &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetricVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let readings = BTreeMap::<MetricId, f64>::deserialize(deserializer)?;
        Ok(MetricVector::from_readings(readings))
    }
}

/// The active goal's metric weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalWeights {
    /// Non-negative weight per metric; missing metrics weigh zero
    #[serde(default)]
    pub weights: BTreeMap<MetricId, f64>,
    /// Life index the goal aims for
    #[serde(default = "default_target_index")]
    pub target_index: f64,
}

fn default_target_index() -> f64 {
    DEFAULT_TARGET_INDEX
}

impl Default for GoalWeights {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            target_index: DEFAULT_TARGET_INDEX,
        }
    }
}

impl GoalWeights {
    pub fn new(weights: BTreeMap<MetricId, f64>) -> Self {
        Self {
            weights,
            ..Default::default()
        }
    }

    pub fn with_target_index(mut self, target: f64) -> Self {
        self.target_index = target.clamp(0.0, 100.0);
        self
    }

    /// Sanitized weight for one metric.
    pub fn weight(&self, id: MetricId) -> f64 {
        match self.weights.get(&id) {
            Some(w) if w.is_finite() && *w > 0.0 => *w,
            _ => 0.0,
        }
    }

    /// Distance from the target index, never negative.
    pub fn gap(&self, index: f64) -> f64 {
        (self.target_index - index).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_clamped_into_domain() {
        let mut v = MetricVector::neutral();
        v.set(MetricId::Energy, 42.0);
        v.set(MetricId::SleepHours, -3.0);
        v.set(MetricId::CashFlow, 1e9);
        assert_eq!(v.get(MetricId::Energy), 10.0);
        assert_eq!(v.get(MetricId::SleepHours), 0.0);
        assert_eq!(v.get(MetricId::CashFlow), 10_000.0);
    }

    #[test]
    fn test_non_finite_resets_to_neutral() {
        let v = MetricVector::neutral()
            .with(MetricId::Mood, f64::NAN)
            .with(MetricId::Focus, f64::INFINITY);
        assert_eq!(v.get(MetricId::Mood), 5.0);
        assert_eq!(v.get(MetricId::Focus), 5.0);
    }

    #[test]
    fn test_stress_goodness_is_inverted() {
        let calm = MetricVector::neutral().with(MetricId::Stress, 1.0);
        let tense = MetricVector::neutral().with(MetricId::Stress, 9.0);
        assert!(calm.goodness(MetricId::Stress) > tense.goodness(MetricId::Stress));
    }

    #[test]
    fn test_sleep_goodness_peaks_at_eight_hours() {
        let ideal = MetricVector::neutral().with(MetricId::SleepHours, 8.0);
        let short = MetricVector::neutral().with(MetricId::SleepHours, 5.0);
        let long = MetricVector::neutral().with(MetricId::SleepHours, 12.0);
        assert_eq!(ideal.goodness(MetricId::SleepHours), 1.0);
        assert!(short.goodness(MetricId::SleepHours) < 1.0);
        assert!(long.goodness(MetricId::SleepHours) < 1.0);
    }

    #[test]
    fn test_life_index_bounds_and_goal_weighting() {
        let v = MetricVector::neutral().with(MetricId::Energy, 10.0);
        let idx = v.life_index(None);
        assert!((0.0..=100.0).contains(&idx));

        let goal = GoalWeights::new(BTreeMap::from([(MetricId::Energy, 1.0)]));
        assert!((v.life_index(Some(&goal)) - 100.0).abs() < 1e-9);

        let empty = GoalWeights::default();
        assert!((v.life_index(Some(&empty)) - idx).abs() < 1e-9);
    }

    #[test]
    fn test_serde_uses_camel_case_ids_and_fills_missing() {
        let v: MetricVector = serde_json::from_str(r#"{"sleepHours": 6.5, "cashFlow": -200}"#)
            .unwrap();
        assert_eq!(v.get(MetricId::SleepHours), 6.5);
        assert_eq!(v.get(MetricId::CashFlow), -200.0);
        assert_eq!(v.get(MetricId::Energy), 5.0);

        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"sleepHours\":6.5"));
    }

    #[test]
    fn test_lexical_order_differs_from_canonical() {
        assert_eq!(
            MetricId::CashFlow.lexical_cmp(&MetricId::Energy),
            Ordering::Less
        );
        assert!(MetricId::CashFlow > MetricId::Energy);
    }

    #[test]
    fn test_snap_rounds_to_step() {
        let d = MetricId::SleepHours.domain();
        assert_eq!(d.snap(7.13), 7.25);
        assert_eq!(d.snap(20.0), 14.0);
    }
}
