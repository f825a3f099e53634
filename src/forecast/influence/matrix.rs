//! Dense influence graph over metric ids.
//!
//! `weights[from][to]` is how far a one-unit change in `from` shifts `to` per
//! propagation step. Weights are clamped to `[-1, 1]`. Cycles are allowed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::forecast::metrics::{MetricId, NUM_METRICS};

/// A single directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfluenceEdge {
    pub from: MetricId,
    pub to: MetricId,
    pub weight: f64,
}

/// Dense `N×N` weight arena indexed by [`MetricId`].
#[derive(Debug, Clone, PartialEq)]
pub struct InfluenceMatrix {
    weights: [[f64; NUM_METRICS]; NUM_METRICS],
}

impl Default for InfluenceMatrix {
    fn default() -> Self {
        Self::empty()
    }
}

impl InfluenceMatrix {
    /// Graph without edges.
    pub fn empty() -> Self {
        Self {
            weights: [[0.0; NUM_METRICS]; NUM_METRICS],
        }
    }

    /// The documented default graph.
    ///
    /// Every edge maps "better" to "better": edges into `stress` from good
    /// metrics are negative and edges out of `stress` into good metrics are
    /// negative.
    pub fn default_graph() -> Self {
        use MetricId::*;
        Self::from_edges(&[
            (SleepHours, Energy, 0.6),
            (SleepHours, Mood, 0.4),
            (SleepHours, Focus, 0.35),
            (SleepHours, Stress, -0.3),
            (Energy, Productivity, 0.5),
            (Energy, Focus, 0.4),
            (Energy, Social, 0.2),
            (Focus, Productivity, 0.5),
            (Stress, Mood, -0.45),
            (Stress, SleepHours, -0.3),
            (Stress, Health, -0.2),
            (Stress, Focus, -0.25),
            (Mood, Social, 0.3),
            (Mood, Energy, 0.15),
            (Social, Mood, 0.25),
            (Health, Energy, 0.3),
            (Productivity, CashFlow, 0.35),
            (Productivity, Stress, -0.1),
            (CashFlow, Stress, -0.001),
        ])
    }

    /// Build from `(from, to, weight)` triples. Later duplicates overwrite earlier ones.
    pub fn from_edges(edges: &[(MetricId, MetricId, f64)]) -> Self {
        let mut m = Self::empty();
        for &(from, to, w) in edges {
            m.set(from, to, w);
        }
        m
    }

    /// Set an edge weight, clamped to `[-1, 1]`. Non-finite weights remove the edge.
    pub fn set(&mut self, from: MetricId, to: MetricId, weight: f64) {
        let w = if weight.is_finite() {
            weight.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        self.weights[from.index()][to.index()] = w;
    }

    pub fn weight(&self, from: MetricId, to: MetricId) -> f64 {
        self.weights[from.index()][to.index()]
    }

    /// Non-zero edges in canonical `(from, to)` order.
    pub fn edges(&self) -> impl Iterator<Item = InfluenceEdge> + '_ {
        MetricId::ALL.iter().flat_map(move |&from| {
            MetricId::ALL.iter().filter_map(move |&to| {
                let weight = self.weight(from, to);
                (weight != 0.0).then_some(InfluenceEdge { from, to, weight })
            })
        })
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// Element-wise convex blend: `(1 - share)·self + share·other`.
    pub fn blend(&self, other: &InfluenceMatrix, share: f64) -> InfluenceMatrix {
        let share = if share.is_finite() {
            share.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mut out = Self::empty();
        for from in MetricId::ALL {
            for to in MetricId::ALL {
                let w = (1.0 - share) * self.weight(from, to) + share * other.weight(from, to);
                out.set(from, to, w);
            }
        }
        out
    }
}

impl Serialize for InfluenceMatrix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let edges: Vec<InfluenceEdge> = self.edges().collect();
        edges.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InfluenceMatrix {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let edges = Vec::<InfluenceEdge>::deserialize(deserializer)?;
        let mut m = Self::empty();
        for e in edges {
            m.set(e.from, e.to, e.weight);
        }
        Ok(m)
    }
}

/// Which weights drive propagation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WeightsSource {
    /// Hand-set weights
    #[default]
    Manual,
    /// Statistically fitted weights
    Learned,
    /// Convex blend; `learned_share` of the learned weights
    Blend { learned_share: f64 },
}

impl fmt::Display for WeightsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightsSource::Manual => f.write_str("manual"),
            WeightsSource::Learned => f.write_str("learned"),
            WeightsSource::Blend { learned_share } => write!(f, "blend:{learned_share}"),
        }
    }
}

/// Parses `manual`, `learned`, `blend` (even split) or `blend:<share>`.
impl FromStr for WeightsSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.split_once(':') {
            None => match s.as_str() {
                "manual" => Ok(WeightsSource::Manual),
                "learned" => Ok(WeightsSource::Learned),
                "blend" => Ok(WeightsSource::Blend { learned_share: 0.5 }),
                other => Err(format!("unknown weights source: {other}")),
            },
            Some(("blend", share)) => {
                let learned_share: f64 = share
                    .parse()
                    .map_err(|_| format!("invalid blend share: {share}"))?;
                if !(0.0..=1.0).contains(&learned_share) {
                    return Err(format!("blend share must be in [0, 1], got {learned_share}"));
                }
                Ok(WeightsSource::Blend { learned_share })
            }
            Some(_) => Err(format!("unknown weights source: {s}")),
        }
    }
}

/// Manual and (optionally) learned weights as delivered by collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfluenceSet {
    pub manual: InfluenceMatrix,
    #[serde(default)]
    pub learned: Option<InfluenceMatrix>,
}

impl InfluenceSet {
    pub fn new(manual: InfluenceMatrix, learned: Option<InfluenceMatrix>) -> Self {
        Self { manual, learned }
    }

    /// Resolve the active matrix for a weights source.
    ///
    /// Falls back to the manual weights when no learned weights are available.
    pub fn resolve(&self, source: WeightsSource) -> InfluenceMatrix {
        match (source, &self.learned) {
            (WeightsSource::Manual, _) => self.manual.clone(),
            (WeightsSource::Learned, Some(learned)) => learned.clone(),
            (WeightsSource::Blend { learned_share }, Some(learned)) => {
                self.manual.blend(learned, learned_share)
            }
            (_, None) => {
                warn!(?source, "No learned weights available, using manual weights");
                self.manual.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_are_clamped() {
        let mut m = InfluenceMatrix::empty();
        m.set(MetricId::Energy, MetricId::Focus, 3.0);
        m.set(MetricId::Stress, MetricId::Mood, -7.0);
        m.set(MetricId::Mood, MetricId::Social, f64::NAN);
        assert_eq!(m.weight(MetricId::Energy, MetricId::Focus), 1.0);
        assert_eq!(m.weight(MetricId::Stress, MetricId::Mood), -1.0);
        assert_eq!(m.edge_count(), 2);
    }

    #[test]
    fn test_default_graph_has_sleep_to_energy() {
        let m = InfluenceMatrix::default_graph();
        assert!(m.weight(MetricId::SleepHours, MetricId::Energy) > 0.0);
        assert!(m.edges().all(|e| (-1.0..=1.0).contains(&e.weight)));
    }

    #[test]
    fn test_edges_iterate_in_canonical_order() {
        let m = InfluenceMatrix::default_graph();
        let keys: Vec<(usize, usize)> =
            m.edges().map(|e| (e.from.index(), e.to.index())).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_blend_is_convex() {
        let a = InfluenceMatrix::from_edges(&[(MetricId::Energy, MetricId::Focus, 0.8)]);
        let b = InfluenceMatrix::from_edges(&[(MetricId::Energy, MetricId::Focus, 0.0)]);
        let m = a.blend(&b, 0.25);
        assert!((m.weight(MetricId::Energy, MetricId::Focus) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_resolve_falls_back_to_manual() {
        let set = InfluenceSet::new(InfluenceMatrix::default_graph(), None);
        assert_eq!(set.resolve(WeightsSource::Learned), set.manual);
        assert_eq!(
            set.resolve(WeightsSource::Blend { learned_share: 0.5 }),
            set.manual
        );
    }

    #[test]
    fn test_resolve_blend_uses_learned_share() {
        let manual = InfluenceMatrix::from_edges(&[(MetricId::Energy, MetricId::Focus, 0.8)]);
        let learned = InfluenceMatrix::from_edges(&[(MetricId::Energy, MetricId::Focus, 0.0)]);
        let set = InfluenceSet::new(manual.clone(), Some(learned.clone()));
        assert_eq!(set.resolve(WeightsSource::Manual), manual);
        assert_eq!(set.resolve(WeightsSource::Learned), learned);
        let mixed = set.resolve(WeightsSource::Blend { learned_share: 0.25 });
        assert!((mixed.weight(MetricId::Energy, MetricId::Focus) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_weights_source_from_str() {
        assert_eq!("manual".parse::<WeightsSource>().unwrap(), WeightsSource::Manual);
        assert_eq!("Learned".parse::<WeightsSource>().unwrap(), WeightsSource::Learned);
        assert_eq!(
            "blend".parse::<WeightsSource>().unwrap(),
            WeightsSource::Blend { learned_share: 0.5 }
        );
        assert_eq!(
            "blend:0.25".parse::<WeightsSource>().unwrap(),
            WeightsSource::Blend { learned_share: 0.25 }
        );
        assert!("blend:1.5".parse::<WeightsSource>().is_err());
        assert!("blend:x".parse::<WeightsSource>().is_err());
        assert!("fitted".parse::<WeightsSource>().is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_edges() {
        let m = InfluenceMatrix::default_graph();
        let json = serde_json::to_string(&m).unwrap();
        let back: InfluenceMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
