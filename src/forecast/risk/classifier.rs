//! Risk-state classifier.
//!
//! Maps a metric snapshot plus history context into a collapse probability,
//! a siren grade and a regime label.
//!
//! Collapse is modeled as independent failure modes: each of four sub-systems
//! (financial, physical, mental, executive) has a reliability, and the overall
//! system survives only if all of them do:
//!
//! ```text
//! reliability_k = 1 - 0.35 · (1 - blend_k)² · (1 + 0.5 · volatility)
//! p_collapse    = 1 - Π_k reliability_k
//! ```

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::regime::{RegimeId, RegimeOutlook, RegimeTransitionModel, DEFAULT_LABEL_WINDOW};
use crate::consts::{SIREN_AMBER_THRESHOLD, SIREN_RED_THRESHOLD};
use crate::forecast::metrics::{MetricId, MetricVector};

/// Maximum failure probability of one sub-system at zero blend and zero volatility.
const MAX_SUBSYSTEM_FAILURE: f64 = 0.35;
/// Extra failure per unit of normalized volatility.
const VOLATILITY_FAILURE_BOOST: f64 = 0.5;

/// Indices kept for trend estimation (current day included).
pub const TREND_WINDOW: usize = 7;
/// Indices kept for volatility estimation.
pub const VOLATILITY_WINDOW: usize = 14;
/// Mean absolute day-over-day index change that maps to volatility 1.0.
const VOLATILITY_SCALE: f64 = 10.0;

/// Siren pressure floor and span: `siren_risk = clamp01((p - 0.10) / 0.40)`.
const SIREN_RISK_FLOOR: f64 = 0.10;
const SIREN_RISK_SPAN: f64 = 0.40;

/// Three-level alert grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SirenLevel {
    Green,
    Amber,
    Red,
}

impl SirenLevel {
    /// Grade a collapse probability.
    pub fn from_p_collapse(p: f64) -> Self {
        if p > SIREN_RED_THRESHOLD {
            SirenLevel::Red
        } else if p >= SIREN_AMBER_THRESHOLD {
            SirenLevel::Amber
        } else {
            SirenLevel::Green
        }
    }
}

impl fmt::Display for SirenLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SirenLevel::Green => "green",
            SirenLevel::Amber => "amber",
            SirenLevel::Red => "red",
        };
        f.write_str(s)
    }
}

/// Continuous siren pressure in `[0, 1]`.
pub fn siren_risk(p_collapse: f64) -> f64 {
    ((p_collapse - SIREN_RISK_FLOOR) / SIREN_RISK_SPAN).clamp(0.0, 1.0)
}

/// Recent index history feeding trend and volatility.
#[derive(Debug, Clone, Default)]
pub struct HistoryContext {
    /// Recent life-index values, oldest first, current day excluded
    recent: VecDeque<f64>,
}

impl HistoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context from prior index values (oldest first).
    pub fn from_indices(indices: &[f64]) -> Self {
        let mut ctx = Self::new();
        for &idx in indices {
            ctx.push(idx);
        }
        ctx
    }

    /// Context from prior snapshots (oldest first), using the goal-free index.
    pub fn from_history(history: &[MetricVector]) -> Self {
        let start = history.len().saturating_sub(VOLATILITY_WINDOW);
        let indices: Vec<f64> = history[start..].iter().map(|v| v.life_index(None)).collect();
        Self::from_indices(&indices)
    }

    /// Append a day. Non-finite values are ignored.
    pub fn push(&mut self, index: f64) {
        if !index.is_finite() {
            return;
        }
        if self.recent.len() == VOLATILITY_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(index);
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Normalized volatility in `[0, 1]` of the stored window.
    pub fn volatility(&self) -> f64 {
        if self.recent.len() < 2 {
            return 0.0;
        }
        let total: f64 = self
            .recent
            .iter()
            .zip(self.recent.iter().skip(1))
            .map(|(a, b)| (b - a).abs())
            .sum();
        let mean = total / (self.recent.len() - 1) as f64;
        (mean / VOLATILITY_SCALE).clamp(0.0, 1.0)
    }

    /// Least-squares slope (index points per day) over the last
    /// `TREND_WINDOW - 1` stored values followed by `current`.
    pub fn trend_with(&self, current: f64) -> f64 {
        let take = self.recent.len().min(TREND_WINDOW - 1);
        let mut ys: Vec<f64> = self.recent.iter().skip(self.recent.len() - take).copied().collect();
        ys.push(current);
        least_squares_slope(&ys)
    }
}

fn least_squares_slope(ys: &[f64]) -> f64 {
    let n = ys.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = ys.iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den <= 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Per-sub-system reliabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubsystemReliability {
    pub financial: f64,
    pub physical: f64,
    pub mental: f64,
    pub executive: f64,
}

impl SubsystemReliability {
    /// Score every sub-system for a snapshot under a volatility level.
    pub fn score(snapshot: &MetricVector, volatility: f64) -> Self {
        use MetricId::*;
        let g = |id| snapshot.goodness(id);
        let vol = if volatility.is_finite() {
            volatility.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let financial = 0.60 * g(CashFlow) + 0.25 * g(Productivity) + 0.15 * g(Stress);
        let physical = 0.40 * g(SleepHours) + 0.35 * g(Health) + 0.25 * g(Energy);
        let mental = 0.40 * g(Mood) + 0.35 * g(Stress) + 0.25 * g(Social);
        let executive = 0.45 * g(Focus) + 0.35 * g(Productivity) + 0.20 * g(Energy);

        Self {
            financial: reliability(financial, vol),
            physical: reliability(physical, vol),
            mental: reliability(mental, vol),
            executive: reliability(executive, vol),
        }
    }

    /// Overall system reliability: product of the sub-systems.
    pub fn system(&self) -> f64 {
        self.financial * self.physical * self.mental * self.executive
    }

    /// The weakest sub-system's name and reliability.
    pub fn weakest(&self) -> (&'static str, f64) {
        [
            ("financial", self.financial),
            ("physical", self.physical),
            ("mental", self.mental),
            ("executive", self.executive),
        ]
        .into_iter()
        .fold(("financial", f64::INFINITY), |best, cur| {
            if cur.1 < best.1 {
                cur
            } else {
                best
            }
        })
    }
}

fn reliability(blend: f64, volatility: f64) -> f64 {
    let shortfall = (1.0 - blend.clamp(0.0, 1.0)).powi(2);
    let failure = MAX_SUBSYSTEM_FAILURE * shortfall * (1.0 + VOLATILITY_FAILURE_BOOST * volatility);
    (1.0 - failure).clamp(0.0, 1.0)
}

/// Output of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierOutput {
    /// Collapse probability in `[0, 1]`
    pub p_collapse: f64,
    pub siren_level: SirenLevel,
    /// Continuous siren pressure in `[0, 1]`
    pub siren_risk: f64,
    pub regime_id: RegimeId,
    /// Goal-free life index of the snapshot
    pub index: f64,
    pub subsystems: SubsystemReliability,
}

/// Classify one snapshot.
pub fn classify(snapshot: &MetricVector, history: &HistoryContext) -> ClassifierOutput {
    let volatility = history.volatility();
    let subsystems = SubsystemReliability::score(snapshot, volatility);
    let p_collapse = (1.0 - subsystems.system()).clamp(0.0, 1.0);

    let index = snapshot.life_index(None);
    let trend = history.trend_with(index);

    ClassifierOutput {
        p_collapse,
        siren_level: SirenLevel::from_p_collapse(p_collapse),
        siren_risk: siren_risk(p_collapse),
        regime_id: RegimeId::classify(index, trend, volatility),
        index,
        subsystems,
    }
}

/// Regime label of every observed day, oldest first, ending with `current`.
pub fn label_history(history: &[MetricVector], current: &MetricVector) -> Vec<RegimeId> {
    let mut context = HistoryContext::new();
    let mut labels = Vec::with_capacity(history.len() + 1);
    for snapshot in history.iter().chain(std::iter::once(current)) {
        let out = classify(snapshot, &context);
        context.push(out.index);
        labels.push(out.regime_id);
    }
    labels
}

/// Fit the transition model on the observed labels and project `steps` days
/// ahead of the current regime.
pub fn regime_outlook(
    history: &[MetricVector],
    current: &MetricVector,
    steps: usize,
) -> RegimeOutlook {
    let labels = label_history(history, current);
    let model = RegimeTransitionModel::from_labels(&labels, DEFAULT_LABEL_WINDOW);
    let now = labels.last().copied().unwrap_or(RegimeId::Stable);
    model.outlook(now, steps)
}
