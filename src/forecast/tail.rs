//! Tail-risk statistics: Value-at-Risk and Expected Shortfall.
//!
//! # Algorithm
//!
//! 1. Drop non-finite samples (warning `non-finite-dropped`), clamp `alpha` to
//!    `[0.5, 0.9999]` (warning `alpha-clamped`).
//! 2. Sort ascending with a stable tiebreak on the original index.
//! 3. `VaR` = linear-interpolated quantile at position `(n - 1)·alpha`.
//! 4. `tail = {x : x ≥ VaR}`, `ES = mean(tail)`, `tail_mass = |tail| / n`.
//!
//! Large values are the bad tail. [`expected_shortfall`] orients samples first
//! when low values are the bad ones.
//!
//! Degenerate input never yields NaN: an empty sample returns an all-zero
//! summary with `empty-sample`, a one-point tail is flagged `single-tail-point`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default confidence level.
pub const DEFAULT_TAIL_ALPHA: f64 = 0.975;
/// Allowed `alpha` range.
pub const MIN_ALPHA: f64 = 0.5;
pub const MAX_ALPHA: f64 = 0.9999;
/// Quantile method tag recorded in every summary.
pub const QUANTILE_METHOD: &str = "linear-interpolated-quantile";

/// Machine-readable sanitization warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TailWarning {
    EmptySample,
    NonFiniteDropped,
    AlphaClamped,
    SingleTailPoint,
}

impl fmt::Display for TailWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TailWarning::EmptySample => "empty-sample",
            TailWarning::NonFiniteDropped => "non-finite-dropped",
            TailWarning::AlphaClamped => "alpha-clamped",
            TailWarning::SingleTailPoint => "single-tail-point",
        };
        f.write_str(s)
    }
}

/// VaR / ES summary over one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TailRiskSummary {
    /// Effective (clamped) confidence level
    pub alpha: f64,
    pub var: f64,
    pub es: f64,
    /// Fraction of samples in the tail
    pub tail_mass: f64,
    /// Finite samples used
    pub sample_count: usize,
    pub method: String,
    pub warnings: Vec<TailWarning>,
}

impl TailRiskSummary {
    fn empty(alpha: f64, mut warnings: Vec<TailWarning>) -> Self {
        warnings.push(TailWarning::EmptySample);
        Self {
            alpha,
            var: 0.0,
            es: 0.0,
            tail_mass: 0.0,
            sample_count: 0,
            method: QUANTILE_METHOD.to_string(),
            warnings,
        }
    }

    pub fn has_warning(&self, warning: TailWarning) -> bool {
        self.warnings.contains(&warning)
    }
}

/// Linear-interpolated quantile of an ascending slice.
///
/// Position is `(n - 1)·q`; the result is interpolated between the floor and
/// ceil indices and kept inside their closed interval. Empty input yields 0.
pub fn quantile_linear(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let q = if q.is_finite() { q.clamp(0.0, 1.0) } else { 0.5 };
    let pos = (n - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = (pos.ceil() as usize).min(n - 1);
    let frac = pos - lo as f64;
    let (a, b) = (sorted[lo], sorted[hi]);
    (a + (b - a) * frac).clamp(a.min(b), a.max(b))
}

/// Sort finite values ascending, ties kept in original order.
pub fn stable_sorted(samples: &[f64]) -> Vec<f64> {
    let mut indexed: Vec<(usize, f64)> = samples
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, x)| x.is_finite())
        .collect();
    indexed.sort_by(|(ia, a), (ib, b)| a.total_cmp(b).then(ia.cmp(ib)));
    indexed.into_iter().map(|(_, x)| x).collect()
}

/// Compute VaR and Expected Shortfall of the upper tail at `alpha`.
pub fn compute_tail_risk(samples: &[f64], alpha: f64) -> TailRiskSummary {
    let mut warnings = Vec::new();

    let effective_alpha = if !alpha.is_finite() {
        warnings.push(TailWarning::AlphaClamped);
        DEFAULT_TAIL_ALPHA
    } else if !(MIN_ALPHA..=MAX_ALPHA).contains(&alpha) {
        warnings.push(TailWarning::AlphaClamped);
        alpha.clamp(MIN_ALPHA, MAX_ALPHA)
    } else {
        alpha
    };

    let sorted = stable_sorted(samples);
    if sorted.len() < samples.len() {
        warnings.push(TailWarning::NonFiniteDropped);
    }
    if sorted.is_empty() {
        return TailRiskSummary::empty(effective_alpha, warnings);
    }

    let n = sorted.len();
    let var = quantile_linear(&sorted, effective_alpha);
    let tail: &[f64] = {
        let first = sorted.partition_point(|&x| x < var);
        &sorted[first..]
    };
    // `var` never exceeds the largest sample, so the tail is non-empty.
    let es = if tail.is_empty() {
        var
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    };
    if tail.len() == 1 {
        warnings.push(TailWarning::SingleTailPoint);
    }

    TailRiskSummary {
        alpha: effective_alpha,
        var,
        es: es.max(var),
        tail_mass: tail.len() as f64 / n as f64,
        sample_count: n,
        method: QUANTILE_METHOD.to_string(),
        warnings,
    }
}

/// Which end of a sample is the bad one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TailDirection {
    /// Low values are bad (e.g. life index)
    Lower,
    /// High values are bad (e.g. collapse probability)
    Upper,
}

/// Expected Shortfall of the worst `worst_fraction` of a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionalShortfall {
    pub direction: TailDirection,
    pub worst_fraction: f64,
    /// Tail boundary in original units
    pub threshold: f64,
    /// Mean of the worst tail in original units
    pub expected_shortfall: f64,
    /// Summary in loss orientation (bad tail is the upper tail)
    pub summary: TailRiskSummary,
}

/// Mean of the worst `worst_fraction` of `samples`.
///
/// Samples are oriented so the bad tail is the upper tail, run through
/// [`compute_tail_risk`] at `alpha = 1 - worst_fraction`, and mapped back.
pub fn expected_shortfall(
    samples: &[f64],
    worst_fraction: f64,
    direction: TailDirection,
) -> DirectionalShortfall {
    let fraction = if worst_fraction.is_finite() {
        worst_fraction
    } else {
        1.0 - DEFAULT_TAIL_ALPHA
    };
    let sign = match direction {
        TailDirection::Upper => 1.0,
        TailDirection::Lower => -1.0,
    };
    let oriented: Vec<f64> = samples.iter().map(|x| sign * x).collect();
    let summary = compute_tail_risk(&oriented, 1.0 - fraction);

    DirectionalShortfall {
        direction,
        worst_fraction: 1.0 - summary.alpha,
        threshold: sign * summary.var,
        expected_shortfall: sign * summary.es,
        summary,
    }
}
