//! File configuration for the CLI and embedding callers.
//!
//! Every field carries a serde default, so an empty TOML file is a valid
//! config and a missing file loads as [`ForecastConfig::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::influence::{InfluenceMatrix, InfluenceSet, WeightsSource};
use super::infra::LogConfig;
use super::policy::{
    EvaluationOptions, PolicyConstraints, PolicyMode, DEFAULT_HORIZONS, DEFAULT_SHOCK_BUDGET,
    DEFAULT_TOP_K,
};
use super::simulation::{SimulationSettings, HORIZON_DAYS};
use crate::errors::ConfigError;
use crate::prelude::Result;

/// Top-level config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub influence: InfluenceConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

/// Where influence weights come from.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InfluenceConfig {
    /// manual, learned, or a blend of the two.
    /// Default: manual
    #[serde(default)]
    pub weights_source: WeightsSource,

    /// JSON edge list replacing the built-in graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_weights: Option<PathBuf>,

    /// JSON edge list of fitted weights. Without it, learned and blend
    /// sources fall back to the manual weights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learned_weights: Option<PathBuf>,
}

impl InfluenceConfig {
    /// Read the configured weight files.
    pub fn load_set(&self) -> Result<InfluenceSet> {
        let manual = match &self.manual_weights {
            Some(path) => read_matrix(path)?,
            None => InfluenceMatrix::default_graph(),
        };
        let learned = self.learned_weights.as_deref().map(read_matrix).transpose()?;
        Ok(InfluenceSet::new(manual, learned))
    }

    /// Matrix for the configured weights source.
    pub fn active_matrix(&self) -> Result<InfluenceMatrix> {
        Ok(self.load_set()?.resolve(self.weights_source))
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if let WeightsSource::Blend { learned_share } = self.weights_source {
            if !(0.0..=1.0).contains(&learned_share) {
                return Err(format!(
                    "influence.weights_source learned_share must be in [0, 1], got {learned_share}"
                ));
            }
        }
        for path in [&self.manual_weights, &self.learned_weights].into_iter().flatten() {
            if !path.exists() {
                return Err(format!("influence weights file not found: {}", path.display()));
            }
        }
        Ok(())
    }
}

fn read_matrix(path: &Path) -> Result<InfluenceMatrix> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Policy evaluator knobs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Mode used when the caller does not ask for all three.
    /// Default: balanced
    #[serde(default = "default_mode")]
    pub mode: PolicyMode,

    /// Candidates reported per decision.
    /// Default: 3
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Rollout horizons (days).
    /// Default: [3, 7]
    #[serde(default = "default_horizons")]
    pub horizons: Vec<usize>,

    /// Seed for tail simulations inside rollouts.
    /// Default: 42
    #[serde(default = "default_seed")]
    pub seed: u32,

    /// Shock-tagged actions allowed per window.
    /// Default: 2
    #[serde(default = "default_shock_budget")]
    pub shock_budget: u32,

    #[serde(default)]
    pub constraints: PolicyConstraints,
}

fn default_mode() -> PolicyMode {
    PolicyMode::Balanced
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_horizons() -> Vec<usize> {
    DEFAULT_HORIZONS.to_vec()
}

fn default_seed() -> u32 {
    42
}

fn default_shock_budget() -> u32 {
    DEFAULT_SHOCK_BUDGET
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            top_k: default_top_k(),
            horizons: default_horizons(),
            seed: default_seed(),
            shock_budget: default_shock_budget(),
            constraints: PolicyConstraints::default(),
        }
    }
}

impl PolicyConfig {
    /// Evaluation options over the default influence graph.
    pub fn options(&self) -> EvaluationOptions {
        let mut options = EvaluationOptions::default()
            .with_seed(self.seed)
            .with_horizons(self.horizons.clone());
        options.top_k = self.top_k;
        options
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.top_k == 0 {
            return Err("policy.top_k must be at least 1".to_string());
        }
        if self.horizons.is_empty() {
            return Err("policy.horizons must not be empty".to_string());
        }
        let longest = HORIZON_DAYS[HORIZON_DAYS.len() - 1];
        if let Some(h) = self.horizons.iter().find(|&&h| h == 0 || h > longest) {
            return Err(format!("policy.horizons entries must be in 1..={longest}, got {h}"));
        }
        self.constraints.validate()
    }
}

impl ForecastConfig {
    /// Validate every section, reporting all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if let Err(e) = self.simulation.validate() {
            problems.push(e.to_string());
        }
        if let Err(e) = self.policy.validate() {
            problems.push(e);
        }
        if let Err(e) = self.influence.validate() {
            problems.push(e);
        }
        if let Err(e) = self.logging.validate() {
            problems.push(e);
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")).into())
        }
    }

    /// Policy options over the configured influence weights.
    pub fn evaluation_options(&self) -> Result<EvaluationOptions> {
        let mut options = self.policy.options();
        options.matrix = self.influence.active_matrix()?;
        Ok(options)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Toml(e.to_string()).into())
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Load a config file; a missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<ForecastConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ForecastConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    ForecastConfig::from_toml(&content)
}

/// Write a commented sample config.
pub fn generate_config(path: impl AsRef<Path>) -> Result<()> {
    let content = ForecastConfig::default().to_toml()?;
    let with_comments = format!(
        "# lifecast configuration\n# See: lifecast --help\n# RUST_LOG overrides logging.level.\n\n{content}"
    );
    std::fs::write(path, with_comments)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = ForecastConfig::from_toml("").unwrap();
        assert_eq!(config, ForecastConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = ForecastConfig::from_toml(
            r#"
[simulation]
horizonDays = 14
seed = 7

[policy]
mode = "risk"
top_k = 5
"#,
        )
        .unwrap();
        assert_eq!(config.simulation.horizon_days, 14);
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.simulation.simulation_count, 500);
        assert_eq!(config.policy.mode, PolicyMode::Risk);
        assert_eq!(config.policy.top_k, 5);
        assert_eq!(config.policy.horizons, vec![3, 7]);
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let text = ForecastConfig::default().to_toml().unwrap();
        let parsed = ForecastConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, ForecastConfig::default());
    }

    #[test]
    fn test_validate_aggregates_problems() {
        let mut config = ForecastConfig::default();
        config.simulation.horizon_days = 11;
        config.policy.top_k = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("horizon"), "{err}");
        assert!(err.contains("top_k"), "{err}");
    }

    #[test]
    fn test_options_carry_policy_fields() {
        let policy = PolicyConfig {
            top_k: 2,
            horizons: vec![7],
            seed: 9,
            ..Default::default()
        };
        let options = policy.options();
        assert_eq!(options.top_k, 2);
        assert_eq!(options.horizons, vec![7]);
        assert_eq!(options.seed, 9);
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lifecast-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_weights_source_from_toml() {
        let config = ForecastConfig::from_toml(
            r#"
[influence.weights_source]
kind = "blend"
learned_share = 0.3
"#,
        )
        .unwrap();
        assert_eq!(
            config.influence.weights_source,
            WeightsSource::Blend { learned_share: 0.3 }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_learned_weights_drive_evaluation_options() {
        use crate::forecast::metrics::MetricId;

        let learned = InfluenceMatrix::from_edges(&[(MetricId::SleepHours, MetricId::Energy, 0.2)]);
        let path = temp_path("learned.json");
        std::fs::write(&path, serde_json::to_string(&learned).unwrap()).unwrap();

        let mut config = ForecastConfig::default();
        config.influence.learned_weights = Some(path.clone());

        config.influence.weights_source = WeightsSource::Learned;
        assert!(config.validate().is_ok());
        assert_eq!(config.evaluation_options().unwrap().matrix, learned);

        config.influence.weights_source = WeightsSource::Blend { learned_share: 0.5 };
        let blended = config.evaluation_options().unwrap().matrix;
        assert_eq!(blended, InfluenceMatrix::default_graph().blend(&learned, 0.5));

        config.influence.weights_source = WeightsSource::Manual;
        assert_eq!(
            config.evaluation_options().unwrap().matrix,
            InfluenceMatrix::default_graph()
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_learned_without_file_uses_manual() {
        let mut config = ForecastConfig::default();
        config.influence.weights_source = WeightsSource::Learned;
        assert_eq!(
            config.evaluation_options().unwrap().matrix,
            InfluenceMatrix::default_graph()
        );
    }

    #[test]
    fn test_influence_validation() {
        let mut config = ForecastConfig::default();
        config.influence.weights_source = WeightsSource::Blend { learned_share: 2.0 };
        config.influence.manual_weights = Some(PathBuf::from("/nonexistent/manual.json"));
        let err = config.influence.validate().unwrap_err();
        assert!(err.contains("learned_share"), "{err}");

        config.influence.weights_source = WeightsSource::Manual;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("not found"), "{err}");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = load_config("/nonexistent/lifecast.toml").unwrap();
        assert_eq!(config, ForecastConfig::default());
    }

    #[test]
    fn test_generate_then_load() {
        let path = std::env::temp_dir().join(format!("lifecast-config-{}.toml", std::process::id()));
        generate_config(&path).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config, ForecastConfig::default());
        let _ = std::fs::remove_file(&path);
    }
}
