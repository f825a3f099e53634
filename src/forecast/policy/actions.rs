//! Action definitions as data.
//!
//! An action's precondition and effect are small enums evaluated against a
//! [`PolicyState`], so a catalog is plain serializable data and hashes
//! deterministically.

use serde::{Deserialize, Serialize};

use super::mode::PolicyMode;
use super::state::PolicyState;
use crate::forecast::metrics::{MetricDeltas, MetricId};

/// Floor on the effect scale of a saturating shape.
const MIN_SHAPE_SCALE: f64 = 0.2;
/// Residual effect of a `Deficit` action outside its trigger zone.
const DEFICIT_RESIDUAL: f64 = 0.25;

/// Life area an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionDomain {
    Sleep,
    Health,
    Work,
    Social,
    Finance,
    Mind,
    /// The synthetic fallback
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTag {
    Recovery,
    Growth,
    Maintenance,
    /// Deliberate stressor; gated by mode and recovery
    Shock,
}

/// Static cost of an action over six dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCost {
    /// Hours
    pub time: f64,
    pub energy: f64,
    pub money: f64,
    /// Hours borrowed from sleep or rest
    pub time_debt: f64,
    pub risk: f64,
    pub entropy: f64,
}

impl ActionCost {
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.time,
            self.energy,
            self.money,
            self.time_debt,
            self.risk,
            self.entropy,
        ]
    }
}

/// Context handed to preconditions and effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionContext {
    pub seed: u32,
    pub mode: PolicyMode,
}

/// When an action may be proposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Precondition {
    Always,
    MetricBelow { metric: MetricId, value: f64 },
    MetricAbove { metric: MetricId, value: f64 },
    CollapseBelow { value: f64 },
    All { all: Vec<Precondition> },
}

impl Precondition {
    pub fn holds(&self, state: &PolicyState, ctx: &ActionContext) -> bool {
        match self {
            Precondition::Always => true,
            Precondition::MetricBelow { metric, value } => state.metrics.get(*metric) < *value,
            Precondition::MetricAbove { metric, value } => state.metrics.get(*metric) > *value,
            Precondition::CollapseBelow { value } => state.p_collapse < *value,
            Precondition::All { all } => all.iter().all(|p| p.holds(state, ctx)),
        }
    }
}

/// Per-day payload of an action before shaping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectParams {
    /// Metric impulses fed to one propagation step
    #[serde(default)]
    pub impulses: MetricDeltas,
    #[serde(default)]
    pub debt: f64,
    /// Direct reduction of the goal gap (index points)
    #[serde(default)]
    pub goal_progress: f64,
    #[serde(default)]
    pub entropy: f64,
    #[serde(default)]
    pub recovery: f64,
}

impl EffectParams {
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            impulses: self.impulses.iter().map(|(k, v)| (*k, v * factor)).collect(),
            debt: self.debt * factor,
            goal_progress: self.goal_progress * factor,
            entropy: self.entropy * factor,
            recovery: self.recovery * factor,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.impulses.values().all(|v| *v == 0.0)
            && self.debt == 0.0
            && self.goal_progress == 0.0
            && self.entropy == 0.0
            && self.recovery == 0.0
    }
}

/// How the payload scales with the current state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EffectShape {
    /// Full payload every day
    Constant,
    /// Scaled by the metric's remaining headroom, `1 - goodness`
    Headroom { metric: MetricId },
    /// Full payload while the metric's goodness is below `below`, a residual otherwise
    Deficit { metric: MetricId, below: f64 },
}

impl EffectShape {
    pub fn scale(&self, state: &PolicyState) -> f64 {
        match self {
            EffectShape::Constant => 1.0,
            EffectShape::Headroom { metric } => {
                (1.0 - state.metrics.goodness(*metric)).clamp(MIN_SHAPE_SCALE, 1.0)
            }
            EffectShape::Deficit { metric, below } => {
                if state.metrics.goodness(*metric) < *below {
                    1.0
                } else {
                    DEFICIT_RESIDUAL
                }
            }
        }
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub id: String,
    pub domain: ActionDomain,
    pub tags: Vec<ActionTag>,
    pub default_cost: ActionCost,
    pub precondition: Precondition,
    pub shape: EffectShape,
    pub params: EffectParams,
}

impl ActionDefinition {
    pub fn has_tag(&self, tag: ActionTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_shock(&self) -> bool {
        self.has_tag(ActionTag::Shock)
    }

    pub fn precondition(&self, state: &PolicyState, ctx: &ActionContext) -> bool {
        self.precondition.holds(state, ctx)
    }

    /// Payload for one day from the given state.
    pub fn effect(&self, state: &PolicyState, _ctx: &ActionContext) -> EffectParams {
        self.params.scaled(self.shape.scale(state))
    }

    /// The zero-effect fallback proposed when nothing else qualifies.
    pub fn hold() -> Self {
        Self {
            id: HOLD_ACTION_ID.to_string(),
            domain: ActionDomain::None,
            tags: Vec::new(),
            default_cost: ActionCost::default(),
            precondition: Precondition::Always,
            shape: EffectShape::Constant,
            params: EffectParams::default(),
        }
    }
}

/// Id of the synthetic fallback action.
pub const HOLD_ACTION_ID: &str = "hold";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::metrics::MetricVector;

    fn state_with(metric: MetricId, value: f64) -> PolicyState {
        PolicyState::from_snapshot(MetricVector::neutral().with(metric, value), &[], None)
    }

    fn ctx() -> ActionContext {
        ActionContext {
            seed: 1,
            mode: PolicyMode::Balanced,
        }
    }

    #[test]
    fn test_preconditions() {
        let tired = state_with(MetricId::Energy, 2.0);
        let below = Precondition::MetricBelow {
            metric: MetricId::Energy,
            value: 3.0,
        };
        let above = Precondition::MetricAbove {
            metric: MetricId::Energy,
            value: 3.0,
        };
        assert!(below.holds(&tired, &ctx()));
        assert!(!above.holds(&tired, &ctx()));
        let both = Precondition::All {
            all: vec![below, Precondition::CollapseBelow { value: 1.0 }],
        };
        assert!(both.holds(&tired, &ctx()));
    }

    #[test]
    fn test_headroom_shrinks_as_metric_saturates() {
        let shape = EffectShape::Headroom {
            metric: MetricId::Social,
        };
        let lonely = shape.scale(&state_with(MetricId::Social, 1.0));
        let busy = shape.scale(&state_with(MetricId::Social, 10.0));
        assert!(lonely > busy);
        assert_eq!(busy, MIN_SHAPE_SCALE);
    }

    #[test]
    fn test_deficit_residual() {
        let shape = EffectShape::Deficit {
            metric: MetricId::Stress,
            below: 0.5,
        };
        assert_eq!(shape.scale(&state_with(MetricId::Stress, 9.0)), 1.0);
        assert_eq!(shape.scale(&state_with(MetricId::Stress, 1.0)), DEFICIT_RESIDUAL);
    }

    #[test]
    fn test_hold_is_zero() {
        let hold = ActionDefinition::hold();
        let state = state_with(MetricId::Mood, 5.0);
        assert!(hold.effect(&state, &ctx()).is_zero());
        assert_eq!(hold.id, HOLD_ACTION_ID);
    }

    #[test]
    fn test_precondition_serde_tagged() {
        let json = serde_json::to_string(&Precondition::CollapseBelow { value: 0.2 }).unwrap();
        assert_eq!(json, r#"{"kind":"collapseBelow","value":0.2}"#);
    }
}
