//! Local state carried through a policy rollout.

use serde::{Deserialize, Serialize};

use crate::consts::EPSILON;
use crate::forecast::metrics::{GoalWeights, MetricId, MetricVector};
use crate::forecast::risk::{classify, HistoryContext, SirenLevel, VOLATILITY_WINDOW};

/// Shock-tagged actions allowed per evaluation window.
pub const DEFAULT_SHOCK_BUDGET: u32 = 2;
/// Nightly sleep below this accrues debt (hours).
pub const SLEEP_DEBT_TARGET: f64 = 8.0;
/// Days of history that contribute to sleep debt.
pub const DEBT_WINDOW: usize = 7;

/// Rollout state. Every rollout works on its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyState {
    pub metrics: MetricVector,
    /// Goal-weighted life index
    pub index: f64,
    pub p_collapse: f64,
    pub siren_risk: f64,
    /// Rolling weekly sleep debt (hours)
    pub debt: f64,
    pub goal_gap: f64,
    /// Disorder proxy: normalized index volatility plus action churn
    pub entropy: f64,
    /// Readiness for deliberate stressors in `[0, 1]`
    pub recovery_score: f64,
    pub shock_budget: u32,
    /// Goal-free index of recent days, oldest first
    #[serde(default)]
    pub recent_indices: Vec<f64>,
}

impl PolicyState {
    /// Derive the rollout state from today's snapshot and prior days.
    pub fn from_snapshot(
        snapshot: MetricVector,
        history: &[MetricVector],
        goal: Option<&GoalWeights>,
    ) -> Self {
        let context = HistoryContext::from_history(history);
        let risk = classify(&snapshot, &context);
        let index = snapshot.life_index(goal);

        // Rolling weekly sum; days missing from a short history count at the observed mean.
        let nightly: Vec<f64> = history
            .iter()
            .rev()
            .take(DEBT_WINDOW - 1)
            .chain(std::iter::once(&snapshot))
            .map(|v| (SLEEP_DEBT_TARGET - v.get(MetricId::SleepHours)).max(0.0))
            .collect();
        let debt = nightly.iter().sum::<f64>() / nightly.len() as f64 * DEBT_WINDOW as f64;

        let start = history.len().saturating_sub(VOLATILITY_WINDOW);
        let recent_indices = history[start..].iter().map(|v| v.life_index(None)).collect();

        Self {
            metrics: snapshot,
            index,
            p_collapse: risk.p_collapse,
            siren_risk: risk.siren_risk,
            debt,
            goal_gap: goal.map_or(0.0, |g| g.gap(index)),
            entropy: context.volatility(),
            recovery_score: recovery_score(&snapshot),
            shock_budget: DEFAULT_SHOCK_BUDGET,
            recent_indices,
        }
    }

    pub fn with_shock_budget(mut self, budget: u32) -> Self {
        self.shock_budget = budget;
        self
    }

    pub fn with_recovery_score(mut self, score: f64) -> Self {
        self.recovery_score = clamp01(score);
        self
    }

    /// History context rebuilt from `recent_indices`.
    pub fn history(&self) -> HistoryContext {
        HistoryContext::from_indices(&self.recent_indices)
    }

    pub fn siren_level(&self) -> SirenLevel {
        SirenLevel::from_p_collapse(self.p_collapse)
    }

    /// Replace non-finite scalars so nothing downstream sees NaN.
    pub fn sanitized(mut self) -> Self {
        let fix = |x: f64, fallback: f64| if x.is_finite() { x } else { fallback };
        self.index = fix(self.index, self.metrics.life_index(None)).clamp(0.0, 100.0);
        self.p_collapse = clamp01(fix(self.p_collapse, 0.0));
        self.siren_risk = clamp01(fix(self.siren_risk, 0.0));
        self.debt = fix(self.debt, 0.0).max(0.0);
        self.goal_gap = fix(self.goal_gap, 0.0).max(0.0);
        self.entropy = fix(self.entropy, 0.0).max(0.0);
        self.recovery_score = clamp01(fix(self.recovery_score, 0.0));
        self.recent_indices.retain(|x| x.is_finite());
        self
    }
}

/// Readiness score from sleep, energy and stress.
pub fn recovery_score(metrics: &MetricVector) -> f64 {
    let score = 0.5 * metrics.goodness(MetricId::SleepHours)
        + 0.3 * metrics.goodness(MetricId::Energy)
        + 0.2 * metrics.goodness(MetricId::Stress);
    clamp01(score)
}

fn clamp01(x: f64) -> f64 {
    if x < EPSILON {
        0.0
    } else {
        x.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_snapshot_neutral() {
        let state = PolicyState::from_snapshot(MetricVector::neutral(), &[], None);
        // neutral sleep is 7h: one hour a night over the weekly window
        assert!((state.debt - DEBT_WINDOW as f64).abs() < 1e-9);
        assert_eq!(state.goal_gap, 0.0);
        assert_eq!(state.shock_budget, DEFAULT_SHOCK_BUDGET);
        assert!(state.recent_indices.is_empty());
        assert!((0.0..=1.0).contains(&state.recovery_score));
    }

    #[test]
    fn test_debt_uses_window() {
        let short = MetricVector::neutral().with(MetricId::SleepHours, 5.0);
        let history = vec![short; 20];
        let state = PolicyState::from_snapshot(short, &history, None);
        assert!((state.debt - 3.0 * DEBT_WINDOW as f64).abs() < 1e-9);
        assert_eq!(state.recent_indices.len(), VOLATILITY_WINDOW);
    }

    #[test]
    fn test_goal_gap_from_target() {
        let goal = GoalWeights::default().with_target_index(90.0);
        let state = PolicyState::from_snapshot(MetricVector::neutral(), &[], Some(&goal));
        assert!((state.goal_gap - (90.0 - state.index)).abs() < 1e-9);
    }

    #[test]
    fn test_sanitized_clears_nan() {
        let mut state = PolicyState::from_snapshot(MetricVector::neutral(), &[], None);
        state.p_collapse = f64::NAN;
        state.debt = f64::INFINITY;
        state.recent_indices.push(f64::NAN);
        let clean = state.sanitized();
        assert_eq!(clean.p_collapse, 0.0);
        assert_eq!(clean.debt, 0.0);
        assert!(clean.recent_indices.is_empty());
    }
}
