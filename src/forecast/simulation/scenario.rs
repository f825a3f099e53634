//! Scripted exogenous shocks.

use serde::{Deserialize, Serialize};

use crate::forecast::metrics::{MetricId, NUM_METRICS};

/// How a shock's delta is applied over its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShockMode {
    /// Applied once, on the first day of the window
    #[default]
    Step,
    /// Added on every day of the window
    Daily,
}

/// Forcing applied to one metric over a bounded window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioShock {
    pub metric_id: MetricId,
    pub delta: f64,
    /// Window length; a `Step` shock ignores everything but the first day
    pub duration_days: usize,
    /// Days before the window opens (0 = first simulated day)
    #[serde(default)]
    pub start_lag_days: usize,
    #[serde(default)]
    pub mode: ShockMode,
}

impl ScenarioShock {
    pub fn step(metric_id: MetricId, delta: f64, start_lag_days: usize) -> Self {
        Self {
            metric_id,
            delta,
            duration_days: 1,
            start_lag_days,
            mode: ShockMode::Step,
        }
    }

    pub fn daily(metric_id: MetricId, delta: f64, duration_days: usize, start_lag_days: usize) -> Self {
        Self {
            metric_id,
            delta,
            duration_days,
            start_lag_days,
            mode: ShockMode::Daily,
        }
    }

    /// Contribution on simulated day `day` (0-indexed).
    pub fn contribution(&self, day: usize) -> f64 {
        if !self.delta.is_finite() || self.duration_days == 0 {
            return 0.0;
        }
        match self.mode {
            ShockMode::Step => {
                if day == self.start_lag_days {
                    self.delta
                } else {
                    0.0
                }
            }
            ShockMode::Daily => {
                let end = self.start_lag_days.saturating_add(self.duration_days);
                if day >= self.start_lag_days && day < end {
                    self.delta
                } else {
                    0.0
                }
            }
        }
    }
}

/// A named set of shocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shocks: Vec<ScenarioShock>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, shocks: Vec<ScenarioShock>) -> Self {
        Self {
            name: name.into(),
            shocks,
        }
    }

    /// Two weeks of short nights.
    pub fn sleep_crunch() -> Self {
        Self::new(
            "sleep_crunch",
            vec![ScenarioShock::daily(MetricId::SleepHours, -0.5, 14, 0)],
        )
    }

    /// One-off expense followed by a week of elevated stress.
    pub fn financial_hit() -> Self {
        Self::new(
            "financial_hit",
            vec![
                ScenarioShock::step(MetricId::CashFlow, -3000.0, 2),
                ScenarioShock::daily(MetricId::Stress, 0.4, 7, 2),
            ],
        )
    }

    /// Sustained overwork.
    pub fn burnout() -> Self {
        Self::new(
            "burnout",
            vec![
                ScenarioShock::daily(MetricId::Stress, 0.3, 21, 0),
                ScenarioShock::daily(MetricId::SleepHours, -0.25, 21, 0),
                ScenarioShock::daily(MetricId::Social, -0.2, 21, 0),
            ],
        )
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "sleep_crunch" => Some(Self::sleep_crunch()),
            "financial_hit" => Some(Self::financial_hit()),
            "burnout" => Some(Self::burnout()),
            _ => None,
        }
    }

    /// Summed shock contribution per metric on `day`.
    pub fn contributions(&self, day: usize) -> [f64; NUM_METRICS] {
        let mut out = [0.0; NUM_METRICS];
        for shock in &self.shocks {
            out[shock.metric_id.index()] += shock.contribution(day);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.shocks.is_empty()
    }
}
