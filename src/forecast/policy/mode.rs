//! Policy modes and their scoring profiles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reward/risk trade-off profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Risk,
    Balanced,
    Growth,
}

impl PolicyMode {
    pub const ALL: [PolicyMode; 3] = [PolicyMode::Risk, PolicyMode::Balanced, PolicyMode::Growth];

    pub const fn as_str(self) -> &'static str {
        match self {
            PolicyMode::Risk => "risk",
            PolicyMode::Balanced => "balanced",
            PolicyMode::Growth => "growth",
        }
    }

    /// Scoring weights for this mode.
    pub fn weights(self) -> ModeWeights {
        match self {
            PolicyMode::Risk => ModeWeights {
                goal_progress: 0.5,
                index_gain: 0.6,
                collapse_loss: 1.6,
                siren_loss: 1.2,
                tail_loss: 1.4,
                debt_growth: 0.8,
            },
            PolicyMode::Balanced => ModeWeights {
                goal_progress: 1.0,
                index_gain: 1.0,
                collapse_loss: 1.0,
                siren_loss: 0.8,
                tail_loss: 0.8,
                debt_growth: 0.5,
            },
            PolicyMode::Growth => ModeWeights {
                goal_progress: 1.6,
                index_gain: 1.2,
                collapse_loss: 0.6,
                siren_loss: 0.4,
                tail_loss: 0.4,
                debt_growth: 0.3,
            },
        }
    }

    /// Whether shock-tagged actions are considered at all.
    pub fn admits_shocks(self) -> bool {
        !matches!(self, PolicyMode::Risk)
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "risk" => Ok(PolicyMode::Risk),
            "balanced" => Ok(PolicyMode::Balanced),
            "growth" => Ok(PolicyMode::Growth),
            other => Err(format!("unknown policy mode: {other}")),
        }
    }
}

/// Per-mode weights on the scored terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeWeights {
    pub goal_progress: f64,
    pub index_gain: f64,
    pub collapse_loss: f64,
    pub siren_loss: f64,
    pub tail_loss: f64,
    pub debt_growth: f64,
}
