//! Policy evaluation: filter, roll out, rank, audit.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::actions::{ActionContext, ActionDefinition};
use super::audit::{AuditRecord, CandidateSummary};
use super::catalog::ActionCatalog;
use super::constraints::PolicyConstraints;
use super::cost::{penalty_score, BudgetEnvelope};
use super::mode::PolicyMode;
use super::rollout::{rollout, RolloutEnv, RolloutResult};
use super::state::PolicyState;
use crate::errors::ForecastError;
use crate::forecast::influence::InfluenceMatrix;
use crate::forecast::metrics::GoalWeights;
use crate::prelude::Result;

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_HORIZONS: [usize; 2] = [3, 7];
/// Scale of the static cost penalty in the final score.
pub const PENALTY_WEIGHT: f64 = 0.1;
/// Siren risk at or below which shock actions may be gated in.
pub const SHOCK_SIREN_CEILING: f64 = 0.2;

/// Inputs shared by every mode of an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOptions {
    pub matrix: InfluenceMatrix,
    #[serde(default)]
    pub goal: Option<GoalWeights>,
    pub horizons: Vec<usize>,
    pub top_k: usize,
    pub seed: u32,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            matrix: InfluenceMatrix::default_graph(),
            goal: None,
            horizons: DEFAULT_HORIZONS.to_vec(),
            top_k: DEFAULT_TOP_K,
            seed: 42,
        }
    }
}

impl EvaluationOptions {
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_horizons(mut self, horizons: Vec<usize>) -> Self {
        self.horizons = horizons;
        self
    }

    pub fn with_goal(mut self, goal: GoalWeights) -> Self {
        self.goal = Some(goal);
        self
    }
}

/// Why an action did not become a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum FilterReason {
    PreconditionFailed,
    ShockBlockedInRiskMode,
    ShockGated,
    FailRateExceeded { fail_rate: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredAction {
    pub action_id: String,
    #[serde(flatten)]
    pub reason: FilterReason,
}

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    pub rank: usize,
    pub action_id: String,
    /// Horizon-weighted rollout score minus the scaled cost penalty
    pub score: f64,
    pub penalty: f64,
    /// No cost dimension over the mode's ceiling; ranks ahead of any violator
    pub within_budget: bool,
    pub horizon_results: Vec<RolloutResult>,
    pub explanation: String,
}

impl RankedCandidate {
    /// Fail rate at the longest evaluated horizon.
    pub fn fail_rate(&self) -> f64 {
        self.horizon_results
            .iter()
            .max_by_key(|r| r.horizon_days)
            .map_or(0.0, |r| r.stats.fail_rate)
    }

    pub fn is_hold(&self) -> bool {
        self.action_id == super::actions::HOLD_ACTION_ID
    }
}

/// Ranked output for one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecision {
    pub mode: PolicyMode,
    /// Never empty; a single hold candidate when nothing passed
    pub candidates: Vec<RankedCandidate>,
    pub fallback: bool,
    pub filtered: Vec<FilteredAction>,
    pub audit: AuditRecord,
}

impl PolicyDecision {
    pub fn best(&self) -> &RankedCandidate {
        // candidates is never empty
        &self.candidates[0]
    }
}

/// Weights per horizon: 3 days 0.4, 7 days 0.6, others 0.5, renormalized.
pub fn horizon_weights(horizons: &[usize]) -> Vec<f64> {
    let raw: Vec<f64> = horizons
        .iter()
        .map(|h| match h {
            3 => 0.4,
            7 => 0.6,
            _ => 0.5,
        })
        .collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return raw;
    }
    raw.iter().map(|w| w / total).collect()
}

fn shock_gate_open(state: &PolicyState, constraints: &PolicyConstraints) -> bool {
    state.siren_risk <= SHOCK_SIREN_CEILING
        && state.shock_budget > 0
        && state.recovery_score >= constraints.min_recovery_score
}

fn screen(
    action: &ActionDefinition,
    state: &PolicyState,
    constraints: &PolicyConstraints,
    ctx: &ActionContext,
) -> Option<FilterReason> {
    if !action.precondition(state, ctx) {
        return Some(FilterReason::PreconditionFailed);
    }
    if action.is_shock() {
        if !ctx.mode.admits_shocks() {
            return Some(FilterReason::ShockBlockedInRiskMode);
        }
        if !shock_gate_open(state, constraints) {
            return Some(FilterReason::ShockGated);
        }
    }
    None
}

fn hold_candidate(mode: PolicyMode, horizons: &[usize]) -> RankedCandidate {
    let hold = ActionDefinition::hold();
    RankedCandidate {
        rank: 1,
        action_id: hold.id,
        score: 0.0,
        penalty: 0.0,
        within_budget: true,
        horizon_results: horizons
            .iter()
            .map(|&h| RolloutResult {
                action_id: super::actions::HOLD_ACTION_ID.to_string(),
                mode,
                horizon_days: h,
                score: 0.0,
                penalty: 0.0,
                tail_signal: 0.0,
                stats: Default::default(),
                end_index: 0.0,
                end_p_collapse: 0.0,
            })
            .collect(),
        explanation: format!("no candidate passed the {mode} filters; hold current course"),
    }
}

/// Rank the catalog for one mode.
///
/// Every filtering and constraint outcome is encoded in the decision; the
/// only errors are invalid options and hashing failures.
pub fn evaluate(
    state: &PolicyState,
    catalog: &ActionCatalog,
    constraints: &PolicyConstraints,
    mode: PolicyMode,
    options: &EvaluationOptions,
) -> Result<PolicyDecision> {
    if options.horizons.is_empty() || options.horizons.contains(&0) {
        return Err(ForecastError::invalid_input(
            "horizons must be non-empty and positive",
        ));
    }
    let state = state.clone().sanitized();
    let ctx = ActionContext {
        seed: options.seed,
        mode,
    };
    let env = RolloutEnv {
        matrix: &options.matrix,
        goal: options.goal.as_ref(),
        constraints,
        ctx,
    };
    let weights = horizon_weights(&options.horizons);
    let envelope = BudgetEnvelope::for_mode(mode);
    let longest = options.horizons.iter().copied().max().unwrap_or(0);

    let mut filtered = Vec::new();
    let mut candidates = Vec::new();

    for action in catalog.actions() {
        if let Some(reason) = screen(action, &state, constraints, &ctx) {
            debug!(action = %action.id, %mode, ?reason, "Action filtered");
            filtered.push(FilteredAction {
                action_id: action.id.clone(),
                reason,
            });
            continue;
        }

        let results: Vec<RolloutResult> = options
            .horizons
            .iter()
            .map(|&h| rollout(&state, action, &env, h))
            .collect();

        let fail_rate = results
            .iter()
            .find(|r| r.horizon_days == longest)
            .map_or(0.0, |r| r.stats.fail_rate);
        if fail_rate > constraints.max_fail_rate {
            filtered.push(FilteredAction {
                action_id: action.id.clone(),
                reason: FilterReason::FailRateExceeded { fail_rate },
            });
            continue;
        }

        let penalty = results.first().map_or(0.0, |r| r.penalty);
        let within_budget = penalty_score(&action.default_cost, &envelope).within_budget();
        let blended: f64 = results.iter().zip(weights.iter()).map(|(r, w)| w * r.score).sum();
        let score = blended - PENALTY_WEIGHT * penalty;
        let explanation = format!(
            "score {:.2} over {} horizons, penalty {:.2}, fail rate {:.0}%{}",
            score,
            results.len(),
            penalty,
            fail_rate * 100.0,
            if within_budget { "" } else { ", over budget" }
        );
        candidates.push(RankedCandidate {
            rank: 0,
            action_id: action.id.clone(),
            score,
            penalty,
            within_budget,
            horizon_results: results,
            explanation,
        });
    }

    candidates.sort_by(rank_order);
    candidates.truncate(options.top_k.max(1));

    let fallback = candidates.is_empty();
    if fallback {
        candidates.push(hold_candidate(mode, &options.horizons));
    }
    for (i, c) in candidates.iter_mut().enumerate() {
        c.rank = i + 1;
    }

    let justifications = justify(mode, &candidates, &filtered, fallback);
    let summaries = candidates
        .iter()
        .map(|c| CandidateSummary {
            rank: c.rank,
            action_id: c.action_id.clone(),
            score: c.score,
            penalty: c.penalty,
            fail_rate: c.fail_rate(),
        })
        .collect();
    let audit = AuditRecord::create(
        &state,
        catalog,
        options.seed,
        mode,
        fallback,
        summaries,
        justifications,
    )?;

    info!(
        %mode,
        best = %candidates[0].action_id,
        score = candidates[0].score,
        filtered = filtered.len(),
        fallback,
        state_hash = %audit.token().state_hash,
        "Policy evaluated"
    );

    Ok(PolicyDecision {
        mode,
        candidates,
        fallback,
        filtered,
        audit,
    })
}

/// Budget-compliant first, then score descending, then id.
fn rank_order(a: &RankedCandidate, b: &RankedCandidate) -> std::cmp::Ordering {
    b.within_budget
        .cmp(&a.within_budget)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.action_id.cmp(&b.action_id))
}

/// Evaluate risk, balanced and growth in that order.
pub fn evaluate_all_modes(
    state: &PolicyState,
    catalog: &ActionCatalog,
    constraints: &PolicyConstraints,
    options: &EvaluationOptions,
) -> Result<Vec<PolicyDecision>> {
    PolicyMode::ALL
        .iter()
        .map(|&mode| evaluate(state, catalog, constraints, mode, options))
        .collect()
}

fn justify(
    mode: PolicyMode,
    candidates: &[RankedCandidate],
    filtered: &[FilteredAction],
    fallback: bool,
) -> Vec<String> {
    let mut out = Vec::new();
    if fallback {
        out.push(format!(
            "no candidate passed the {mode} filters; {} actions excluded",
            filtered.len()
        ));
    } else if let Some(best) = candidates.first() {
        out.push(format!(
            "{} ranks first in {mode} mode with score {:.2}",
            best.action_id, best.score
        ));
    }
    for c in candidates.iter().filter(|c| !c.within_budget) {
        out.push(format!("{} exceeds the {mode} budget envelope", c.action_id));
    }
    let shocks = filtered
        .iter()
        .filter(|f| {
            matches!(
                f.reason,
                FilterReason::ShockBlockedInRiskMode | FilterReason::ShockGated
            )
        })
        .count();
    if shocks > 0 {
        out.push(format!("{shocks} shock actions held back"));
    }
    let failing: Vec<&str> = filtered
        .iter()
        .filter(|f| matches!(f.reason, FilterReason::FailRateExceeded { .. }))
        .map(|f| f.action_id.as_str())
        .collect();
    if !failing.is_empty() {
        out.push(format!("constraint fail rate too high: {}", failing.join(", ")));
    }
    out
}
