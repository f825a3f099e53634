//! Impulse propagation through the influence graph.
//!
//! ```text
//! working = clamp(base + impulses)
//! repeat steps:
//!     acc[to] = Σ w(from→to) · (working[from] - base[from]) / 2
//!     working = clamp(working + acc)
//! ```
//!
//! The half-damping keeps cyclic graphs from running away. Contributions of a
//! step are computed from the working vector at the start of that step, so
//! edge iteration order cannot change the result.

use serde::{Deserialize, Serialize};

use super::matrix::InfluenceMatrix;
use crate::forecast::metrics::{MetricDeltas, MetricId, MetricVector, NUM_METRICS};

/// Damping applied to every edge contribution.
pub const PROPAGATION_DAMPING: f64 = 0.5;

/// Minimum and maximum propagation depth.
pub const MIN_STEPS: u8 = 1;
pub const MAX_STEPS: u8 = 3;

/// Per-target contributions of one propagation step.
///
/// `deviation_source` supplies the vector whose deviation from `base` drives
/// the graph; the simulator passes its lagged ring-buffer entry here.
pub fn influence_contributions(
    deviation_source: &MetricVector,
    base: &MetricVector,
    matrix: &InfluenceMatrix,
) -> [f64; NUM_METRICS] {
    let mut acc = [0.0; NUM_METRICS];
    for edge in matrix.edges() {
        let deviation = deviation_source.get(edge.from) - base.get(edge.from);
        acc[edge.to.index()] += edge.weight * deviation * PROPAGATION_DAMPING;
    }
    acc
}

/// Apply `impulses` to `base` and propagate for `steps` (clamped to 1..=3).
pub fn propagate(
    base: &MetricVector,
    impulses: &MetricDeltas,
    matrix: &InfluenceMatrix,
    steps: u8,
) -> MetricVector {
    let steps = steps.clamp(MIN_STEPS, MAX_STEPS);
    let mut working = *base;
    working.apply(impulses);

    for _ in 0..steps {
        let acc = influence_contributions(&working, base, matrix);
        for id in MetricId::ALL {
            working.add(id, acc[id.index()]);
        }
    }
    working
}

/// One edge's share of an explained change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverContribution {
    pub from: MetricId,
    pub to: MetricId,
    pub weight: f64,
    /// `|Δfrom · weight|`
    pub score: f64,
}

/// Rank edges by how much they carried the change from `base` to `result`.
///
/// Sorted by score descending; ties broken by `(from, to)` lexical id order.
/// Edges with a zero score are omitted.
pub fn explain_drivers(
    result: &MetricVector,
    base: &MetricVector,
    matrix: &InfluenceMatrix,
    top_n: usize,
) -> Vec<DriverContribution> {
    let mut drivers: Vec<DriverContribution> = matrix
        .edges()
        .filter_map(|edge| {
            let delta = result.get(edge.from) - base.get(edge.from);
            let score = (delta * edge.weight).abs();
            (score.is_finite() && score > 0.0).then_some(DriverContribution {
                from: edge.from,
                to: edge.to,
                weight: edge.weight,
                score,
            })
        })
        .collect();

    drivers.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.from.lexical_cmp(&b.from))
            .then_with(|| a.to.lexical_cmp(&b.to))
    });
    drivers.truncate(top_n);
    drivers
}
