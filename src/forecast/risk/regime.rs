//! Discrete regime labels and their empirical Markov transition model.
//!
//! # Four Regime States
//!
//! - **Thriving (0)**: rising index from a healthy level
//! - **Stable (1)**: no meaningful trend
//! - **Declining (2)**: index falling day over day
//! - **Crisis (3)**: low index, or a sharp fall under high volatility (worst state)
//!
//! Transition probabilities are the Dirichlet posterior mean of observed
//! label-to-label counts over a rolling window, with a sticky-diagonal prior so
//! that short histories still produce a well-formed stochastic matrix.

use serde::{Deserialize, Serialize};

/// Number of regimes.
pub const NUM_REGIMES: usize = 4;

/// Default rolling window of labels used to learn transitions.
pub const DEFAULT_LABEL_WINDOW: usize = 90;

// Classification thresholds (index points, index points per day, normalized volatility)
const CRISIS_INDEX: f64 = 35.0;
const CRISIS_TREND: f64 = -5.0;
const CRISIS_VOLATILITY: f64 = 0.5;
const DECLINE_TREND: f64 = -1.5;
const THRIVE_TREND: f64 = 1.5;
const THRIVE_INDEX: f64 = 60.0;

/// Discrete regime id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RegimeId {
    Thriving = 0,
    Stable = 1,
    Declining = 2,
    Crisis = 3,
}

impl RegimeId {
    pub const ALL: [RegimeId; NUM_REGIMES] = [
        RegimeId::Thriving,
        RegimeId::Stable,
        RegimeId::Declining,
        RegimeId::Crisis,
    ];

    /// The worst discrete state.
    pub const WORST: RegimeId = RegimeId::Crisis;

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RegimeId::Thriving => "thriving",
            RegimeId::Stable => "stable",
            RegimeId::Declining => "declining",
            RegimeId::Crisis => "crisis",
        }
    }

    /// Label a day from its index, trend and volatility.
    pub fn classify(index: f64, trend: f64, volatility: f64) -> Self {
        if index < CRISIS_INDEX || (trend < CRISIS_TREND && volatility > CRISIS_VOLATILITY) {
            RegimeId::Crisis
        } else if trend < DECLINE_TREND {
            RegimeId::Declining
        } else if trend > THRIVE_TREND && index >= THRIVE_INDEX {
            RegimeId::Thriving
        } else {
            RegimeId::Stable
        }
    }
}

impl From<RegimeId> for u8 {
    fn from(r: RegimeId) -> u8 {
        r as u8
    }
}

impl TryFrom<u8> for RegimeId {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        RegimeId::from_index(v as usize).ok_or_else(|| format!("unknown regime id {v}"))
    }
}

/// Sticky-diagonal pseudo-counts.
///
/// Roughly six effective observations per row, most of them on the diagonal.
fn default_prior_counts() -> [[f64; NUM_REGIMES]; NUM_REGIMES] {
    let diag = 4.0;
    let near = 0.75;
    let far = 0.25;
    [
        [diag, near, far, far],
        [near, diag, near, far],
        [far, near, diag, near],
        [far, far, near, diag],
    ]
}

/// Empirical Markov transition model over regime labels.
#[derive(Debug, Clone)]
pub struct RegimeTransitionModel {
    /// prior_counts[i][j] = pseudo-count for transition i -> j
    prior_counts: [[f64; NUM_REGIMES]; NUM_REGIMES],
    /// Observed transition counts
    transition_counts: [[f64; NUM_REGIMES]; NUM_REGIMES],
    /// Number of transitions observed
    observation_count: u64,
}

impl Default for RegimeTransitionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl RegimeTransitionModel {
    pub fn new() -> Self {
        Self {
            prior_counts: default_prior_counts(),
            transition_counts: [[0.0; NUM_REGIMES]; NUM_REGIMES],
            observation_count: 0,
        }
    }

    /// Learn from the last `window` labels of a history (oldest first).
    pub fn from_labels(labels: &[RegimeId], window: usize) -> Self {
        let mut model = Self::new();
        let start = labels.len().saturating_sub(window);
        for pair in labels[start..].windows(2) {
            model.observe(pair[0], pair[1]);
        }
        model
    }

    /// Record one transition.
    pub fn observe(&mut self, from: RegimeId, to: RegimeId) {
        self.transition_counts[from.index()][to.index()] += 1.0;
        self.observation_count += 1;
    }

    pub fn observation_count(&self) -> u64 {
        self.observation_count
    }

    /// One-step transition matrix; `m[i][j] = P(next = j | current = i)`.
    pub fn transition_matrix(&self) -> [[f64; NUM_REGIMES]; NUM_REGIMES] {
        let mut m = [[0.0; NUM_REGIMES]; NUM_REGIMES];
        for (i, row) in m.iter_mut().enumerate() {
            let row_sum: f64 = (0..NUM_REGIMES)
                .map(|j| self.prior_counts[i][j] + self.transition_counts[i][j])
                .sum();
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (self.prior_counts[i][j] + self.transition_counts[i][j]) / row_sum;
            }
        }
        m
    }

    /// Distribution over regimes `steps` days ahead of `current`.
    pub fn predict_next(&self, current: RegimeId, steps: usize) -> [f64; NUM_REGIMES] {
        let matrix = self.transition_matrix();
        let mut dist = [0.0; NUM_REGIMES];
        dist[current.index()] = 1.0;

        for _ in 0..steps {
            let mut next = [0.0; NUM_REGIMES];
            for (i, &p) in dist.iter().enumerate() {
                for (j, slot) in next.iter_mut().enumerate() {
                    *slot += p * matrix[i][j];
                }
            }
            dist = next;
        }
        dist
    }

    /// Most likely regime `steps` days ahead. Ties resolve to the lower id.
    pub fn most_likely_next(&self, current: RegimeId, steps: usize) -> RegimeId {
        let dist = self.predict_next(current, steps);
        let mut best = 0;
        for (i, &p) in dist.iter().enumerate() {
            if p > dist[best] {
                best = i;
            }
        }
        RegimeId::from_index(best).unwrap_or(RegimeId::Stable)
    }
}

/// Regime forecast over a horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeOutlook {
    /// Regime of the latest observed day
    pub current: RegimeId,
    pub horizon_days: usize,
    /// `distribution[id]` = probability of regime `id` at the horizon
    pub distribution: [f64; NUM_REGIMES],
    pub most_likely: RegimeId,
    /// Transitions the model was fitted on
    pub observations: u64,
}

impl RegimeOutlook {
    /// Probability of ending the horizon in the worst regime.
    pub fn p_worst(&self) -> f64 {
        self.distribution[RegimeId::WORST.index()]
    }
}

impl RegimeTransitionModel {
    pub fn outlook(&self, current: RegimeId, steps: usize) -> RegimeOutlook {
        RegimeOutlook {
            current,
            horizon_days: steps,
            distribution: self.predict_next(current, steps),
            most_likely: self.most_likely_next(current, steps),
            observations: self.observation_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(RegimeId::classify(30.0, 0.0, 0.0), RegimeId::Crisis);
        assert_eq!(RegimeId::classify(50.0, -6.0, 0.8), RegimeId::Crisis);
        assert_eq!(RegimeId::classify(50.0, -6.0, 0.2), RegimeId::Declining);
        assert_eq!(RegimeId::classify(70.0, 2.0, 0.1), RegimeId::Thriving);
        assert_eq!(RegimeId::classify(50.0, 2.0, 0.1), RegimeId::Stable);
        assert_eq!(RegimeId::classify(50.0, 0.0, 0.1), RegimeId::Stable);
    }

    #[test]
    fn test_transition_rows_are_stochastic() {
        let model = RegimeTransitionModel::from_labels(
            &[
                RegimeId::Stable,
                RegimeId::Stable,
                RegimeId::Declining,
                RegimeId::Crisis,
                RegimeId::Declining,
            ],
            DEFAULT_LABEL_WINDOW,
        );
        assert_eq!(model.observation_count(), 4);
        for row in model.transition_matrix() {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_learning_shifts_probability_mass() {
        let labels = vec![RegimeId::Stable, RegimeId::Declining].repeat(20);
        let model = RegimeTransitionModel::from_labels(&labels, DEFAULT_LABEL_WINDOW);
        let prior = RegimeTransitionModel::new().transition_matrix();
        let learned = model.transition_matrix();
        let s = RegimeId::Stable.index();
        let d = RegimeId::Declining.index();
        assert!(learned[s][d] > prior[s][d]);
        assert_eq!(
            model.most_likely_next(RegimeId::Stable, 1),
            RegimeId::Declining
        );
    }

    #[test]
    fn test_window_limits_history() {
        let mut labels = vec![RegimeId::Crisis; 50];
        labels.extend(vec![RegimeId::Stable; 10]);
        let model = RegimeTransitionModel::from_labels(&labels, 10);
        assert_eq!(model.observation_count(), 9);
    }

    #[test]
    fn test_predict_next_multiplies_matrix() {
        let model = RegimeTransitionModel::new();
        let zero = model.predict_next(RegimeId::Crisis, 0);
        assert_eq!(zero, [0.0, 0.0, 0.0, 1.0]);

        let one = model.predict_next(RegimeId::Crisis, 1);
        let m = model.transition_matrix();
        for j in 0..NUM_REGIMES {
            assert!((one[j] - m[3][j]).abs() < 1e-12);
        }

        let two = model.predict_next(RegimeId::Crisis, 2);
        let expected: f64 = (0..NUM_REGIMES).map(|k| m[3][k] * m[k][0]).sum();
        assert!((two[0] - expected).abs() < 1e-12);
        assert!((two.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_outlook_matches_prediction() {
        let labels = vec![RegimeId::Stable, RegimeId::Declining].repeat(10);
        let model = RegimeTransitionModel::from_labels(&labels, DEFAULT_LABEL_WINDOW);
        let outlook = model.outlook(RegimeId::Stable, 1);
        assert_eq!(outlook.distribution, model.predict_next(RegimeId::Stable, 1));
        assert_eq!(outlook.most_likely, RegimeId::Declining);
        assert_eq!(outlook.observations, 19);
        assert_eq!(outlook.p_worst(), outlook.distribution[3]);
    }

    #[test]
    fn test_regime_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&RegimeId::Crisis).unwrap(), "3");
        let r: RegimeId = serde_json::from_str("2").unwrap();
        assert_eq!(r, RegimeId::Declining);
        assert!(serde_json::from_str::<RegimeId>("7").is_err());
    }
}
