//! Versioned action catalog.
//!
//! Order is significant: it participates in the catalog hash.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::actions::{
    ActionCost, ActionDefinition, ActionDomain, ActionTag, EffectParams, EffectShape,
    Precondition, HOLD_ACTION_ID,
};
use crate::errors::ForecastError;
use crate::forecast::metrics::{MetricDeltas, MetricId};
use crate::prelude::Result;

pub const CATALOG_VERSION: &str = "catalog-2024.2";

/// Ordered, uniquely keyed set of actions.
///
/// Deserialization goes through [`ActionCatalog::new`], so a catalog file
/// cannot carry duplicate ids or shadow the hold fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawCatalog")]
pub struct ActionCatalog {
    version: String,
    actions: Vec<ActionDefinition>,
}

/// Unchecked wire form of [`ActionCatalog`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalog {
    version: String,
    actions: Vec<ActionDefinition>,
}

impl TryFrom<RawCatalog> for ActionCatalog {
    type Error = ForecastError;

    fn try_from(raw: RawCatalog) -> Result<Self> {
        Self::new(raw.version, raw.actions)
    }
}

impl ActionCatalog {
    /// Build a catalog, rejecting duplicate or reserved ids.
    pub fn new(version: impl Into<String>, actions: Vec<ActionDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for action in &actions {
            if action.id == HOLD_ACTION_ID {
                return Err(ForecastError::invalid_input(format!(
                    "action id '{HOLD_ACTION_ID}' is reserved"
                )));
            }
            if !seen.insert(action.id.as_str()) {
                return Err(ForecastError::invalid_input(format!(
                    "duplicate action id '{}'",
                    action.id
                )));
            }
        }
        Ok(Self {
            version: version.into(),
            actions,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }

    pub fn get(&self, id: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self {
            version: CATALOG_VERSION.to_string(),
            actions: default_actions(),
        }
    }
}

fn deltas(pairs: &[(MetricId, f64)]) -> MetricDeltas {
    pairs.iter().copied().collect()
}

fn default_actions() -> Vec<ActionDefinition> {
    use MetricId::*;
    vec![
        ActionDefinition {
            id: "sleep-extension".into(),
            domain: ActionDomain::Sleep,
            tags: vec![ActionTag::Recovery],
            default_cost: ActionCost {
                time: 1.0,
                time_debt: 0.5,
                entropy: 0.1,
                ..Default::default()
            },
            precondition: Precondition::MetricBelow {
                metric: SleepHours,
                value: 8.5,
            },
            shape: EffectShape::Headroom { metric: SleepHours },
            params: EffectParams {
                impulses: deltas(&[(SleepHours, 0.75), (Energy, 0.3)]),
                debt: -0.75,
                recovery: 0.08,
                ..Default::default()
            },
        },
        ActionDefinition {
            id: "walk-outside".into(),
            domain: ActionDomain::Health,
            tags: vec![ActionTag::Recovery],
            default_cost: ActionCost {
                time: 0.5,
                energy: 0.3,
                ..Default::default()
            },
            precondition: Precondition::Always,
            shape: EffectShape::Constant,
            params: EffectParams {
                impulses: deltas(&[(Health, 0.3), (Mood, 0.3), (Stress, -0.3)]),
                recovery: 0.03,
                ..Default::default()
            },
        },
        ActionDefinition {
            id: "deep-work-block".into(),
            domain: ActionDomain::Work,
            tags: vec![ActionTag::Growth],
            default_cost: ActionCost {
                time: 2.0,
                energy: 1.0,
                entropy: 0.2,
                ..Default::default()
            },
            precondition: Precondition::MetricAbove {
                metric: Energy,
                value: 3.0,
            },
            shape: EffectShape::Constant,
            params: EffectParams {
                impulses: deltas(&[(Productivity, 0.6), (Focus, 0.2), (Stress, 0.2), (Energy, -0.2)]),
                goal_progress: 1.0,
                entropy: 0.02,
                ..Default::default()
            },
        },
        ActionDefinition {
            id: "budget-review".into(),
            domain: ActionDomain::Finance,
            tags: vec![ActionTag::Maintenance],
            default_cost: ActionCost {
                time: 0.5,
                entropy: 0.05,
                ..Default::default()
            },
            precondition: Precondition::Always,
            shape: EffectShape::Deficit {
                metric: CashFlow,
                below: 0.6,
            },
            params: EffectParams {
                impulses: deltas(&[(CashFlow, 150.0), (Stress, -0.2)]),
                goal_progress: 0.2,
                entropy: -0.02,
                ..Default::default()
            },
        },
        ActionDefinition {
            id: "social-call".into(),
            domain: ActionDomain::Social,
            tags: vec![ActionTag::Recovery],
            default_cost: ActionCost {
                time: 0.75,
                energy: 0.2,
                ..Default::default()
            },
            precondition: Precondition::Always,
            shape: EffectShape::Headroom { metric: Social },
            params: EffectParams {
                impulses: deltas(&[(Social, 0.5), (Mood, 0.2)]),
                recovery: 0.02,
                ..Default::default()
            },
        },
        ActionDefinition {
            id: "meditation".into(),
            domain: ActionDomain::Mind,
            tags: vec![ActionTag::Recovery],
            default_cost: ActionCost {
                time: 0.25,
                ..Default::default()
            },
            precondition: Precondition::Always,
            shape: EffectShape::Deficit {
                metric: Stress,
                below: 0.5,
            },
            params: EffectParams {
                impulses: deltas(&[(Stress, -0.5), (Focus, 0.2)]),
                entropy: -0.03,
                recovery: 0.04,
                ..Default::default()
            },
        },
        ActionDefinition {
            id: "hiit-session".into(),
            domain: ActionDomain::Health,
            tags: vec![ActionTag::Growth, ActionTag::Shock],
            default_cost: ActionCost {
                time: 0.75,
                energy: 2.0,
                risk: 0.5,
                entropy: 0.1,
                ..Default::default()
            },
            precondition: Precondition::All {
                all: vec![
                    Precondition::MetricAbove {
                        metric: Energy,
                        value: 5.0,
                    },
                    Precondition::CollapseBelow { value: 0.25 },
                ],
            },
            shape: EffectShape::Constant,
            params: EffectParams {
                impulses: deltas(&[(Health, 0.5), (Energy, -0.3), (Stress, 0.2), (Mood, 0.2)]),
                goal_progress: 0.5,
                recovery: -0.15,
                ..Default::default()
            },
        },
        ActionDefinition {
            id: "cold-exposure".into(),
            domain: ActionDomain::Mind,
            tags: vec![ActionTag::Shock],
            default_cost: ActionCost {
                time: 0.25,
                energy: 0.5,
                risk: 0.3,
                entropy: 0.2,
                ..Default::default()
            },
            precondition: Precondition::CollapseBelow { value: 0.3 },
            shape: EffectShape::Constant,
            params: EffectParams {
                impulses: deltas(&[(Stress, 0.3), (Mood, 0.3), (Focus, 0.3)]),
                recovery: -0.1,
                ..Default::default()
            },
        },
    ]
}
