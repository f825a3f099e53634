//! Simulation settings.
//!
//! Horizon and run count are drawn from small enumerated sets to bound cost.

use serde::{Deserialize, Serialize};

use crate::errors::ForecastError;
use crate::prelude::Result;

/// Allowed horizons (days).
pub const HORIZON_DAYS: [usize; 6] = [3, 7, 14, 30, 60, 90];
/// Allowed run counts.
pub const SIMULATION_COUNTS: [usize; 7] = [25, 50, 100, 250, 500, 1000, 2000];
/// Maximum influence lag (ring-buffer depth).
pub const MAX_LAG: usize = 7;
/// Largest accepted noise multiplier.
pub const MAX_NOISE_MULTIPLIER: f64 = 10.0;

/// Monte Carlo settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSettings {
    /// Simulated days per run.
    /// Default: 30
    #[serde(default = "default_horizon_days")]
    pub horizon_days: usize,

    /// Independent runs.
    /// Default: 500
    #[serde(default = "default_simulation_count")]
    pub simulation_count: usize,

    /// Scales every metric's noise sigma.
    /// Default: 1.0
    #[serde(default = "default_noise_multiplier")]
    pub noise_multiplier: f64,

    /// Collapse probability counted as a threshold crossing.
    /// Default: 0.35
    #[serde(default = "default_collapse_threshold")]
    pub collapse_threshold: f64,

    /// Worst fraction of end-of-horizon outcomes averaged into Expected Shortfall.
    /// Default: 0.1
    #[serde(default = "default_tail_alpha")]
    pub tail_alpha: f64,

    /// Base seed; run `s` uses `seed + s·17`.
    /// Default: 42
    #[serde(default = "default_seed")]
    pub seed: u32,

    /// Depth of the lagged-influence ring buffer.
    /// Default: 1
    #[serde(default = "default_lag")]
    pub lag: usize,
}

fn default_horizon_days() -> usize {
    30
}
fn default_simulation_count() -> usize {
    500
}
fn default_noise_multiplier() -> f64 {
    1.0
}
fn default_collapse_threshold() -> f64 {
    0.35
}
fn default_tail_alpha() -> f64 {
    0.1
}
fn default_seed() -> u32 {
    42
}
fn default_lag() -> usize {
    1
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            simulation_count: default_simulation_count(),
            noise_multiplier: default_noise_multiplier(),
            collapse_threshold: default_collapse_threshold(),
            tail_alpha: default_tail_alpha(),
            seed: default_seed(),
            lag: default_lag(),
        }
    }
}

impl SimulationSettings {
    /// Smallest run count at a given horizon; used for compact re-runs.
    pub fn compact(horizon_days: usize, seed: u32) -> Self {
        Self {
            horizon_days,
            simulation_count: SIMULATION_COUNTS[0],
            seed,
            ..Default::default()
        }
    }

    pub fn with_horizon_days(mut self, days: usize) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn with_simulation_count(mut self, count: usize) -> Self {
        self.simulation_count = count;
        self
    }

    pub fn with_noise_multiplier(mut self, multiplier: f64) -> Self {
        self.noise_multiplier = multiplier;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_lag(mut self, lag: usize) -> Self {
        self.lag = lag;
        self
    }

    /// Validate against the enumerated sets and numeric ranges.
    pub fn validate(&self) -> Result<()> {
        if !HORIZON_DAYS.contains(&self.horizon_days) {
            return Err(ForecastError::invalid_settings(format!(
                "horizon_days must be one of {:?}, got {}",
                HORIZON_DAYS, self.horizon_days
            )));
        }
        if !SIMULATION_COUNTS.contains(&self.simulation_count) {
            return Err(ForecastError::invalid_settings(format!(
                "simulation_count must be one of {:?}, got {}",
                SIMULATION_COUNTS, self.simulation_count
            )));
        }
        if !self.noise_multiplier.is_finite()
            || self.noise_multiplier < 0.0
            || self.noise_multiplier > MAX_NOISE_MULTIPLIER
        {
            return Err(ForecastError::invalid_settings(format!(
                "noise_multiplier must be in [0, {MAX_NOISE_MULTIPLIER}], got {}",
                self.noise_multiplier
            )));
        }
        if !(self.collapse_threshold > 0.0 && self.collapse_threshold < 1.0) {
            return Err(ForecastError::invalid_settings(format!(
                "collapse_threshold must be in (0, 1), got {}",
                self.collapse_threshold
            )));
        }
        if !(self.tail_alpha > 0.0 && self.tail_alpha <= 0.5) {
            return Err(ForecastError::invalid_settings(format!(
                "tail_alpha must be in (0, 0.5], got {}",
                self.tail_alpha
            )));
        }
        if self.lag == 0 || self.lag > MAX_LAG {
            return Err(ForecastError::invalid_settings(format!(
                "lag must be in [1, {MAX_LAG}], got {}",
                self.lag
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_validate_accepts_defaults() {
        assert!(SimulationSettings::default().validate().is_ok());
        assert!(SimulationSettings::compact(7, 1).validate().is_ok());
    }

    #[test]
    fn test_settings_validate_rejects_unlisted_horizon() {
        let err = SimulationSettings::default()
            .with_horizon_days(31)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("horizon_days"), "{err}");
    }

    #[test]
    fn test_settings_validate_rejects_unlisted_count() {
        let err = SimulationSettings::default()
            .with_simulation_count(123)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("simulation_count"), "{err}");
    }

    #[test]
    fn test_settings_validate_rejects_bad_noise_and_lag() {
        assert!(SimulationSettings::default()
            .with_noise_multiplier(f64::NAN)
            .validate()
            .is_err());
        assert!(SimulationSettings::default().with_lag(0).validate().is_err());
        assert!(SimulationSettings::default().with_lag(8).validate().is_err());
    }

    #[test]
    fn test_settings_serde_defaults() {
        let s: SimulationSettings = serde_json::from_str(r#"{"horizonDays": 14}"#).unwrap();
        assert_eq!(s.horizon_days, 14);
        assert_eq!(s.simulation_count, 500);
        assert_eq!(s.seed, 42);
    }
}
