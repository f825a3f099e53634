//! Day-by-day rollout of one action.
//!
//! # Per-day score
//!
//! ```text
//! u(x)  = x            if x ≥ 0
//!       = 1.75 · x     otherwise
//! score = w_goal·u(goal progress) + w_index·u(Δindex)
//!       + w_collapse·u(-100·Δp) + w_siren·u(-40·Δsiren) + w_debt·u(-Δdebt)
//!       - 2 · 100·Δp   (only when p > 0.35 and Δp > 0)
//! ```
//!
//! Day scores are discounted by `γ = 0.92` per day. The tail signal blends a
//! compact Monte Carlo re-run with a two-path worst/best heuristic and is
//! scored once per horizon.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::actions::{ActionContext, ActionDefinition};
use super::constraints::PolicyConstraints;
use super::cost::{penalty_score, BudgetEnvelope};
use super::mode::PolicyMode;
use super::state::{recovery_score, PolicyState, SLEEP_DEBT_TARGET};
use crate::consts::SIREN_RED_THRESHOLD;
use crate::forecast::influence::{propagate, InfluenceMatrix};
use crate::forecast::metrics::{GoalWeights, MetricDeltas, MetricId};
use crate::forecast::risk::{classify, HistoryContext, VOLATILITY_WINDOW};
use crate::forecast::simulation::{simulate, SimulationInput, SimulationSettings, HORIZON_DAYS};
use crate::forecast::tail::{expected_shortfall, quantile_linear, stable_sorted, TailDirection};

/// Per-day discount.
pub const DISCOUNT: f64 = 0.92;
/// Losses count this many times their magnitude.
pub const LOSS_AVERSION: f64 = 1.75;
/// Extra weight on collapse increases once collapse is already high.
pub const HIGH_COLLAPSE_PENALTY: f64 = 2.0;

const COLLAPSE_POINTS: f64 = 100.0;
const SIREN_POINTS: f64 = 40.0;
const TAIL_POINTS: f64 = 25.0;

/// Worst fraction used by the compact re-run and the score stats.
const TAIL_FRACTION: f64 = 0.1;
/// Blend between the compact re-run and the two-path heuristic.
const MC_TAIL_SHARE: f64 = 0.5;
const WORST_PATH_SHARE: f64 = 0.7;
const BEST_PATH_SHARE: f64 = 0.3;
/// Daily decay of the rolling sleep-debt sum.
const DEBT_RETENTION: f64 = 6.0 / 7.0;

/// Daily nudge applied on the adverse path; negated on the favourable one.
const ADVERSE_IMPULSE: [(MetricId, f64); 3] = [
    (MetricId::Stress, 0.5),
    (MetricId::SleepHours, -0.5),
    (MetricId::Mood, -0.3),
];

/// Read-only inputs shared by every rollout of an evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RolloutEnv<'a> {
    pub matrix: &'a InfluenceMatrix,
    pub goal: Option<&'a GoalWeights>,
    pub constraints: &'a PolicyConstraints,
    pub ctx: ActionContext,
}

/// Summary of the day scores of one rollout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStats {
    pub mean: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    /// Mean of the worst 10% of days
    pub tail_mean: f64,
    /// Share of days breaking at least one constraint
    pub fail_rate: f64,
}

impl RolloutStats {
    fn from_days(day_scores: &[f64], fail_days: usize) -> Self {
        if day_scores.is_empty() {
            return Self::default();
        }
        let sorted = stable_sorted(day_scores);
        let n = day_scores.len() as f64;
        Self {
            mean: sorted.iter().sum::<f64>() / n,
            p10: quantile_linear(&sorted, 0.10),
            p50: quantile_linear(&sorted, 0.50),
            p90: quantile_linear(&sorted, 0.90),
            tail_mean: expected_shortfall(day_scores, TAIL_FRACTION, TailDirection::Lower)
                .expected_shortfall,
            fail_rate: fail_days as f64 / n,
        }
    }
}

/// Result for one `(action, mode, horizon)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutResult {
    pub action_id: String,
    pub mode: PolicyMode,
    pub horizon_days: usize,
    /// Discounted day scores plus the tail term
    pub score: f64,
    /// Static cost penalty against the mode's envelope
    pub penalty: f64,
    pub tail_signal: f64,
    pub stats: RolloutStats,
    pub end_index: f64,
    pub end_p_collapse: f64,
}

struct Trace {
    day_scores: Vec<f64>,
    fail_days: usize,
    end: PolicyState,
}

fn utility(x: f64) -> f64 {
    if x >= 0.0 {
        x
    } else {
        LOSS_AVERSION * x
    }
}

/// Advance one day under `action`, optionally with an extra exogenous nudge.
fn advance(
    state: &PolicyState,
    action: &ActionDefinition,
    env: &RolloutEnv<'_>,
    history: &mut HistoryContext,
    extra: Option<&MetricDeltas>,
    first_day: bool,
) -> (PolicyState, f64) {
    let effect = action.effect(state, &env.ctx);
    let mut impulses = effect.impulses.clone();
    if let Some(extra) = extra {
        for (id, d) in extra {
            *impulses.entry(*id).or_insert(0.0) += d;
        }
    }

    let metrics = propagate(&state.metrics, &impulses, env.matrix, 1);
    let risk = classify(&metrics, history);
    history.push(risk.index);

    let index = metrics.life_index(env.goal);
    let nightly_debt = (SLEEP_DEBT_TARGET - metrics.get(MetricId::SleepHours)).max(0.0);
    let mut recent_indices = state.recent_indices.clone();
    recent_indices.push(risk.index);
    if recent_indices.len() > VOLATILITY_WINDOW {
        recent_indices.remove(0);
    }

    let next = PolicyState {
        metrics,
        index,
        p_collapse: risk.p_collapse,
        siren_risk: risk.siren_risk,
        debt: (state.debt * DEBT_RETENTION + nightly_debt + effect.debt).max(0.0),
        goal_gap: env.goal.map_or(state.goal_gap, |g| g.gap(index)),
        entropy: (state.entropy + effect.entropy).max(0.0),
        recovery_score: (0.5 * state.recovery_score
            + 0.5 * recovery_score(&metrics)
            + effect.recovery)
            .clamp(0.0, 1.0),
        shock_budget: if first_day && action.is_shock() {
            state.shock_budget.saturating_sub(1)
        } else {
            state.shock_budget
        },
        recent_indices,
    };

    let w = env.ctx.mode.weights();
    let d_p = next.p_collapse - state.p_collapse;
    let mut score = w.goal_progress * utility(state.goal_gap - next.goal_gap + effect.goal_progress)
        + w.index_gain * utility(next.index - state.index)
        + w.collapse_loss * utility(-d_p * COLLAPSE_POINTS)
        + w.siren_loss * utility(-(next.siren_risk - state.siren_risk) * SIREN_POINTS)
        + w.debt_growth * utility(-(next.debt - state.debt));
    if state.p_collapse > SIREN_RED_THRESHOLD && d_p > 0.0 {
        score -= HIGH_COLLAPSE_PENALTY * d_p * COLLAPSE_POINTS;
    }
    (next, score)
}

fn trace(
    start: &PolicyState,
    action: &ActionDefinition,
    env: &RolloutEnv<'_>,
    horizon_days: usize,
    extra: Option<&MetricDeltas>,
) -> Trace {
    let mut history = start.history();
    let mut state = start.clone();
    let mut day_scores = Vec::with_capacity(horizon_days);
    let mut fail_days = 0;

    for day in 0..horizon_days {
        let (next, score) = advance(&state, action, env, &mut history, extra, day == 0);
        if env.constraints.violations(start, &next) > 0 {
            fail_days += 1;
        }
        day_scores.push(score);
        state = next;
    }

    Trace {
        day_scores,
        fail_days,
        end: state,
    }
}

/// Smallest allowed simulation horizon covering `days`.
fn compact_horizon(days: usize) -> usize {
    HORIZON_DAYS
        .iter()
        .copied()
        .find(|&h| h >= days)
        .unwrap_or(HORIZON_DAYS[HORIZON_DAYS.len() - 1])
}

/// Collapse Expected Shortfall of a compact re-run from `end`, minus the start level.
fn mc_tail(start: &PolicyState, end: &PolicyState, env: &RolloutEnv<'_>, horizon_days: usize) -> f64 {
    let mut settings = SimulationSettings::compact(compact_horizon(horizon_days), env.ctx.seed);
    settings.tail_alpha = TAIL_FRACTION;
    let mut input = SimulationInput::new(end.metrics).with_matrix(env.matrix.clone()).with_settings(settings);
    input.goal = env.goal.cloned();

    match simulate(&input) {
        Ok(outcome) => outcome.tail.collapse.expected_shortfall - start.p_collapse,
        Err(e) => {
            warn!(error = %e, "Compact tail re-run failed, using zero");
            0.0
        }
    }
}

/// Blended tail signal in collapse-probability units.
pub fn tail_signal(mc: f64, worst_delta: f64, best_delta: f64) -> f64 {
    MC_TAIL_SHARE * mc
        + (1.0 - MC_TAIL_SHARE) * (WORST_PATH_SHARE * worst_delta + BEST_PATH_SHARE * best_delta)
}

/// Roll `action` forward `horizon_days` from `start`. `start` is never mutated.
pub fn rollout(
    start: &PolicyState,
    action: &ActionDefinition,
    env: &RolloutEnv<'_>,
    horizon_days: usize,
) -> RolloutResult {
    let penalty = penalty_score(&action.default_cost, &BudgetEnvelope::for_mode(env.ctx.mode)).penalty_score;
    let main = trace(start, action, env, horizon_days, None);

    let adverse: MetricDeltas = ADVERSE_IMPULSE.iter().copied().collect();
    let favourable: MetricDeltas = ADVERSE_IMPULSE.iter().map(|(id, d)| (*id, -d)).collect();
    let worst = trace(start, action, env, horizon_days, Some(&adverse));
    let best = trace(start, action, env, horizon_days, Some(&favourable));

    let signal = tail_signal(
        mc_tail(start, &main.end, env, horizon_days),
        worst.end.p_collapse - start.p_collapse,
        best.end.p_collapse - start.p_collapse,
    );

    let discounted: f64 = main
        .day_scores
        .iter()
        .enumerate()
        .map(|(t, s)| DISCOUNT.powi(t as i32) * s)
        .sum();
    let tail_term = env.ctx.mode.weights().tail_loss * utility(-signal * TAIL_POINTS);

    RolloutResult {
        action_id: action.id.clone(),
        mode: env.ctx.mode,
        horizon_days,
        score: discounted + tail_term,
        penalty,
        tail_signal: signal,
        stats: RolloutStats::from_days(&main.day_scores, main.fail_days),
        end_index: main.end.index,
        end_p_collapse: main.end.p_collapse,
    }
}
