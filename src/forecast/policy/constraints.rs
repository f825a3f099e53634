//! Rollout constraints.

use serde::{Deserialize, Serialize};

use super::state::PolicyState;

/// Ceilings checked against the rollout's start state every day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConstraints {
    /// Largest allowed rise in collapse probability.
    /// Default: 0.05
    #[serde(default = "default_max_collapse_delta")]
    pub max_collapse_delta: f64,

    /// Largest allowed rise in siren risk.
    /// Default: 0.15
    #[serde(default = "default_max_siren_delta")]
    pub max_siren_delta: f64,

    /// Largest allowed rise in debt (hours).
    /// Default: 2.0
    #[serde(default = "default_max_debt_delta")]
    pub max_debt_delta: f64,

    /// Recovery score required before a shock action is considered.
    /// Default: 0.5
    #[serde(default = "default_min_recovery_score")]
    pub min_recovery_score: f64,

    /// Candidates failing more often than this at their longest horizon are dropped.
    /// Default: 0.5
    #[serde(default = "default_max_fail_rate")]
    pub max_fail_rate: f64,
}

fn default_max_collapse_delta() -> f64 {
    0.05
}
fn default_max_siren_delta() -> f64 {
    0.15
}
fn default_max_debt_delta() -> f64 {
    2.0
}
fn default_min_recovery_score() -> f64 {
    0.5
}
fn default_max_fail_rate() -> f64 {
    0.5
}

impl Default for PolicyConstraints {
    fn default() -> Self {
        Self {
            max_collapse_delta: default_max_collapse_delta(),
            max_siren_delta: default_max_siren_delta(),
            max_debt_delta: default_max_debt_delta(),
            min_recovery_score: default_min_recovery_score(),
            max_fail_rate: default_max_fail_rate(),
        }
    }
}

impl PolicyConstraints {
    /// Number of ceilings `now` breaks relative to `start`.
    pub fn violations(&self, start: &PolicyState, now: &PolicyState) -> u32 {
        let mut count = 0;
        if now.p_collapse - start.p_collapse > self.max_collapse_delta {
            count += 1;
        }
        if now.siren_risk - start.siren_risk > self.max_siren_delta {
            count += 1;
        }
        if now.debt - start.debt > self.max_debt_delta {
            count += 1;
        }
        count
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("max_collapse_delta", self.max_collapse_delta),
            ("max_siren_delta", self.max_siren_delta),
            ("max_debt_delta", self.max_debt_delta),
        ] {
            if !v.is_finite() {
                return Err(format!("{name} must be finite, got {v}"));
            }
        }
        if !(0.0..=1.0).contains(&self.min_recovery_score) {
            return Err(format!(
                "min_recovery_score must be in [0, 1], got {}",
                self.min_recovery_score
            ));
        }
        if !(0.0..=1.0).contains(&self.max_fail_rate) {
            return Err(format!(
                "max_fail_rate must be in [0, 1], got {}",
                self.max_fail_rate
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::metrics::MetricVector;

    #[test]
    fn test_violations_count_each_ceiling() {
        let start = PolicyState::from_snapshot(MetricVector::neutral(), &[], None);
        let mut now = start.clone();
        let c = PolicyConstraints::default();
        assert_eq!(c.violations(&start, &now), 0);

        now.p_collapse += 0.1;
        now.debt += 3.0;
        assert_eq!(c.violations(&start, &now), 2);
    }

    #[test]
    fn test_validate() {
        assert!(PolicyConstraints::default().validate().is_ok());
        let bad = PolicyConstraints {
            max_fail_rate: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
