//! Static cost model.
//!
//! `penalty = Σ weight_d · cost_d + 10_000 · |{d : cost_d > ceiling_d}|`
//!
//! The jump per violated dimension keeps budget-violating actions below every
//! compliant one regardless of the other scoring terms.

use serde::{Deserialize, Serialize};

use super::actions::ActionCost;
use super::mode::PolicyMode;
use crate::consts::BUDGET_VIOLATION_PENALTY;

/// Cost dimension names in `ActionCost::as_array` order.
pub const COST_DIMENSIONS: [&str; 6] = ["time", "energy", "money", "timeDebt", "risk", "entropy"];

/// Per-dimension weights and ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetEnvelope {
    pub weights: ActionCost,
    pub ceilings: ActionCost,
}

impl BudgetEnvelope {
    /// Mode-tuned envelope.
    pub fn for_mode(mode: PolicyMode) -> Self {
        match mode {
            PolicyMode::Risk => Self {
                weights: ActionCost {
                    time: 1.0,
                    energy: 1.5,
                    money: 0.01,
                    time_debt: 2.0,
                    risk: 5.0,
                    entropy: 2.0,
                },
                ceilings: ActionCost {
                    time: 2.0,
                    energy: 1.5,
                    money: 50.0,
                    time_debt: 1.0,
                    risk: 0.3,
                    entropy: 0.3,
                },
            },
            PolicyMode::Balanced => Self {
                weights: ActionCost {
                    time: 1.0,
                    energy: 1.0,
                    money: 0.005,
                    time_debt: 1.5,
                    risk: 3.0,
                    entropy: 1.0,
                },
                ceilings: ActionCost {
                    time: 3.0,
                    energy: 2.5,
                    money: 150.0,
                    time_debt: 2.0,
                    risk: 0.6,
                    entropy: 0.5,
                },
            },
            PolicyMode::Growth => Self {
                weights: ActionCost {
                    time: 0.75,
                    energy: 0.75,
                    money: 0.003,
                    time_debt: 1.0,
                    risk: 1.5,
                    entropy: 0.5,
                },
                ceilings: ActionCost {
                    time: 4.0,
                    energy: 3.0,
                    money: 300.0,
                    time_debt: 3.0,
                    risk: 1.0,
                    entropy: 0.8,
                },
            },
        }
    }
}

/// Penalty breakdown for one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAssessment {
    pub penalty_score: f64,
    /// Weighted cost without the violation jumps
    pub weighted_cost: f64,
    /// Names of the dimensions over budget
    pub violations: Vec<String>,
}

impl CostAssessment {
    pub fn within_budget(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Score a static cost against an envelope. Non-finite costs count as violations.
pub fn penalty_score(cost: &ActionCost, envelope: &BudgetEnvelope) -> CostAssessment {
    let costs = cost.as_array();
    let weights = envelope.weights.as_array();
    let ceilings = envelope.ceilings.as_array();

    let mut weighted_cost = 0.0;
    let mut violations = Vec::new();
    for d in 0..COST_DIMENSIONS.len() {
        let c = costs[d];
        if !c.is_finite() {
            violations.push(COST_DIMENSIONS[d].to_string());
            continue;
        }
        weighted_cost += weights[d] * c.max(0.0);
        if c > ceilings[d] {
            violations.push(COST_DIMENSIONS[d].to_string());
        }
    }

    CostAssessment {
        penalty_score: weighted_cost + BUDGET_VIOLATION_PENALTY * violations.len() as f64,
        weighted_cost,
        violations,
    }
}
