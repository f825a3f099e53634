//! Monte Carlo scenario simulator.
//!
//! # Model
//!
//! Every run `s` owns a [`Mulberry32`] seeded with `seed + s·17` and a private
//! copy of the state and lag ring buffer. The ring starts as the last `lag`
//! observed days, ending with `base`. For each simulated day:
//!
//! 1. Scenario shock contribution per metric
//! 2. Influence from the `lag`-days-old ring entry (half-damped edge rule)
//! 3. Gaussian noise per metric, `sigma · noise_multiplier`
//! 4. `next = clamp(prev + shock + influence + noise)`
//! 5. Classify the day, track ever-red and threshold crossings
//!
//! Runs are independent, so [`simulate_parallel`] fans them out with rayon and
//! aggregates in run order; its output is identical to [`simulate`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::drivers::{cohort_drivers, recommend, CohortDriver, Recommendation, TOP_DRIVERS};
use super::rng::Mulberry32;
use super::scenario::Scenario;
use super::settings::SimulationSettings;
use crate::forecast::influence::{influence_contributions, InfluenceMatrix};
use crate::forecast::metrics::{GoalWeights, MetricId, MetricVector, NUM_METRICS};
use crate::forecast::risk::{
    classify, regime_outlook, HistoryContext, RegimeId, RegimeOutlook, SirenLevel,
};
use crate::forecast::tail::{expected_shortfall, quantile_linear, stable_sorted, DirectionalShortfall, TailDirection};
use crate::prelude::Result;

fn default_matrix() -> InfluenceMatrix {
    InfluenceMatrix::default_graph()
}

/// Everything one simulation needs. Read-only for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInput {
    /// Starting snapshot; influence is measured against it
    pub base: MetricVector,
    /// Prior snapshots, oldest first
    #[serde(default)]
    pub history: Vec<MetricVector>,
    #[serde(default = "default_matrix")]
    pub matrix: InfluenceMatrix,
    #[serde(default)]
    pub settings: SimulationSettings,
    #[serde(default)]
    pub scenario: Option<Scenario>,
    /// Weights for the reported index; uniform when absent
    #[serde(default)]
    pub goal: Option<GoalWeights>,
}

impl SimulationInput {
    pub fn new(base: MetricVector) -> Self {
        Self {
            base,
            history: Vec::new(),
            matrix: InfluenceMatrix::default_graph(),
            settings: SimulationSettings::default(),
            scenario: None,
            goal: None,
        }
    }

    pub fn with_history(mut self, history: Vec<MetricVector>) -> Self {
        self.history = history;
        self
    }

    pub fn with_matrix(mut self, matrix: InfluenceMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn with_settings(mut self, settings: SimulationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }

    pub fn with_goal(mut self, goal: GoalWeights) -> Self {
        self.goal = Some(goal);
        self
    }
}

/// Cooperative cancellation flag, checked once per run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Whether every requested run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RunStatus {
    Complete,
    Cancelled { completed: usize },
}

impl RunStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, RunStatus::Complete)
    }
}

/// Per-day `p10 / p50 / p90` bands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantileSeries {
    pub p10: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
}

impl QuantileSeries {
    fn from_pools(pools: &[Vec<f64>]) -> Self {
        let mut series = Self {
            p10: Vec::with_capacity(pools.len()),
            p50: Vec::with_capacity(pools.len()),
            p90: Vec::with_capacity(pools.len()),
        };
        for pool in pools {
            let sorted = stable_sorted(pool);
            series.p10.push(quantile_linear(&sorted, 0.10));
            series.p50.push(quantile_linear(&sorted, 0.50));
            series.p90.push(quantile_linear(&sorted, 0.90));
        }
        series
    }

    pub fn len(&self) -> usize {
        self.p50.len()
    }

    pub fn is_empty(&self) -> bool {
        self.p50.is_empty()
    }
}

/// End-of-horizon Expected Shortfall for both tracked series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TailSummaries {
    /// Worst (lowest) end-of-horizon index values
    pub index: DirectionalShortfall,
    /// Worst (highest) end-of-horizon collapse probabilities
    pub collapse: DirectionalShortfall,
}

/// Aggregated simulation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    pub status: RunStatus,
    pub runs_requested: usize,
    pub runs_completed: usize,
    pub horizon_days: usize,
    pub seed: u32,
    pub index_bands: QuantileSeries,
    pub collapse_bands: QuantileSeries,
    pub tail: TailSummaries,
    /// Share of runs that ever reached red siren or the worst regime
    pub p_ever_red: f64,
    /// Share of runs whose collapse probability reached the threshold
    pub p_threshold_crossed: f64,
    pub top_drivers: Vec<CohortDriver>,
    pub recommendations: Vec<Recommendation>,
    /// Regime projection from the observed history over the horizon
    pub regime_outlook: RegimeOutlook,
}

/// Result of a single run.
#[derive(Debug, Clone)]
pub(crate) struct PathOutcome {
    index_by_day: Vec<f64>,
    collapse_by_day: Vec<f64>,
    ever_red: bool,
    threshold_crossed: bool,
    metric_means: [f64; NUM_METRICS],
}

/// The last `lag` observed days, oldest first and ending with `base`.
///
/// Short histories are padded at the front with their oldest entry.
pub(crate) fn seed_ring(
    base: &MetricVector,
    history: &[MetricVector],
    lag: usize,
) -> VecDeque<MetricVector> {
    let lag = lag.max(1);
    let tail = &history[history.len().saturating_sub(lag - 1)..];
    let pad = tail.first().copied().unwrap_or(*base);
    let mut ring: VecDeque<MetricVector> = std::iter::repeat(pad)
        .take(lag - 1 - tail.len())
        .collect();
    ring.extend(tail.iter().copied());
    ring.push_back(*base);
    ring
}

/// Run `s` of a simulation.
pub(crate) fn run_path(input: &SimulationInput, start: &HistoryContext, path: usize) -> PathOutcome {
    let settings = &input.settings;
    let base = input.base;
    let lag = settings.lag.max(1);
    let mut rng = Mulberry32::for_path(settings.seed, path);

    let mut current = base;
    let mut ring = seed_ring(&base, &input.history, lag);
    let mut context = start.clone();

    let mut out = PathOutcome {
        index_by_day: Vec::with_capacity(settings.horizon_days),
        collapse_by_day: Vec::with_capacity(settings.horizon_days),
        ever_red: false,
        threshold_crossed: false,
        metric_means: [0.0; NUM_METRICS],
    };

    for day in 0..settings.horizon_days {
        let shock = input
            .scenario
            .as_ref()
            .map_or([0.0; NUM_METRICS], |s| s.contributions(day));
        let lagged = ring.front().copied().unwrap_or(current);
        let influence = influence_contributions(&lagged, &base, &input.matrix);

        let mut next = current;
        for id in MetricId::ALL {
            let i = id.index();
            let prev = current.get(id);
            // Draw even at zero noise so runs stay aligned across multipliers.
            let noise = rng.next_gaussian() * id.noise_sigma() * settings.noise_multiplier;
            next.set(id, prev + shock[i] + influence[i] + noise);
        }

        let risk = classify(&next, &context);
        context.push(risk.index);

        if risk.siren_level == SirenLevel::Red || risk.regime_id == RegimeId::WORST {
            out.ever_red = true;
        }
        if risk.p_collapse >= settings.collapse_threshold {
            out.threshold_crossed = true;
        }

        out.index_by_day.push(next.life_index(input.goal.as_ref()));
        out.collapse_by_day.push(risk.p_collapse);
        for (acc, v) in out.metric_means.iter_mut().zip(next.values().iter()) {
            *acc += v;
        }

        ring.push_back(next);
        if ring.len() > lag {
            ring.pop_front();
        }
        current = next;
    }

    if settings.horizon_days > 0 {
        let days = settings.horizon_days as f64;
        for m in out.metric_means.iter_mut() {
            *m /= days;
        }
    }
    out
}

/// Run a complete simulation on the calling thread.
pub fn simulate(input: &SimulationInput) -> Result<SimulationOutcome> {
    simulate_with(input, &CancelFlag::new(), |_, _| {})
}

/// Run on the calling thread with cancellation and per-run progress.
///
/// `progress(done, total)` fires after every completed run. The flag is
/// checked before each run, so an in-flight run always finishes.
pub fn simulate_with<F>(input: &SimulationInput, cancel: &CancelFlag, mut progress: F) -> Result<SimulationOutcome>
where
    F: FnMut(usize, usize),
{
    input.settings.validate()?;
    let total = input.settings.simulation_count;
    info!(
        runs = total,
        horizon_days = input.settings.horizon_days,
        seed = input.settings.seed,
        "Starting simulation"
    );

    let start = HistoryContext::from_history(&input.history);
    let mut paths = Vec::with_capacity(total);
    let mut status = RunStatus::Complete;

    for s in 0..total {
        if cancel.is_cancelled() {
            status = RunStatus::Cancelled { completed: s };
            info!(completed = s, total, "Simulation cancelled");
            break;
        }
        paths.push(run_path(input, &start, s));
        progress(s + 1, total);
    }

    Ok(aggregate(input, &paths, status))
}

/// Run a complete simulation with runs spread across the rayon pool.
pub fn simulate_parallel(input: &SimulationInput) -> Result<SimulationOutcome> {
    input.settings.validate()?;
    let total = input.settings.simulation_count;
    info!(
        runs = total,
        horizon_days = input.settings.horizon_days,
        seed = input.settings.seed,
        threads = rayon::current_num_threads(),
        "Starting parallel simulation"
    );

    let start = HistoryContext::from_history(&input.history);
    let paths: Vec<PathOutcome> = (0..total)
        .into_par_iter()
        .map(|s| run_path(input, &start, s))
        .collect();

    Ok(aggregate(input, &paths, RunStatus::Complete))
}

fn aggregate(input: &SimulationInput, paths: &[PathOutcome], status: RunStatus) -> SimulationOutcome {
    let settings = &input.settings;
    let horizon = settings.horizon_days;
    let n = paths.len();

    let mut index_pools = vec![Vec::with_capacity(n); horizon];
    let mut collapse_pools = vec![Vec::with_capacity(n); horizon];
    let mut end_index = Vec::with_capacity(n);
    let mut end_collapse = Vec::with_capacity(n);
    let mut ever_red = 0usize;
    let mut crossed = 0usize;
    let mut cohorts = Vec::with_capacity(n);

    for path in paths {
        for day in 0..horizon {
            index_pools[day].push(path.index_by_day[day]);
            collapse_pools[day].push(path.collapse_by_day[day]);
        }
        if let (Some(&idx), Some(&p)) = (path.index_by_day.last(), path.collapse_by_day.last()) {
            end_index.push(idx);
            end_collapse.push(p);
        }
        ever_red += usize::from(path.ever_red);
        crossed += usize::from(path.threshold_crossed);
        cohorts.push((path.ever_red, path.metric_means));
    }

    let share = |k: usize| if n == 0 { 0.0 } else { k as f64 / n as f64 };
    let tail = TailSummaries {
        index: expected_shortfall(&end_index, settings.tail_alpha, TailDirection::Lower),
        collapse: expected_shortfall(&end_collapse, settings.tail_alpha, TailDirection::Upper),
    };
    let p_threshold_crossed = share(crossed);
    let top_drivers = cohort_drivers(&cohorts, TOP_DRIVERS);
    let recommendations = recommend(&top_drivers, &tail.collapse, p_threshold_crossed);

    debug!(
        runs = n,
        index_es = tail.index.expected_shortfall,
        collapse_es = tail.collapse.expected_shortfall,
        p_ever_red = share(ever_red),
        "Simulation aggregated"
    );

    SimulationOutcome {
        status,
        runs_requested: settings.simulation_count,
        runs_completed: n,
        horizon_days: horizon,
        seed: settings.seed,
        index_bands: QuantileSeries::from_pools(&index_pools),
        collapse_bands: QuantileSeries::from_pools(&collapse_pools),
        tail,
        p_ever_red: share(ever_red),
        p_threshold_crossed,
        top_drivers,
        recommendations,
        regime_outlook: regime_outlook(&input.history, &input.base, horizon),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::simulation::scenario::ScenarioShock;

    fn small_input() -> SimulationInput {
        SimulationInput::new(MetricVector::neutral()).with_settings(
            SimulationSettings::default()
                .with_horizon_days(14)
                .with_simulation_count(100),
        )
    }

    #[test]
    fn test_simulate_is_deterministic() {
        let input = small_input();
        let a = serde_json::to_string(&simulate(&input).unwrap()).unwrap();
        let b = serde_json::to_string(&simulate(&input).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bands_are_ordered_and_sized() {
        let out = simulate(&small_input()).unwrap();
        assert_eq!(out.index_bands.len(), 14);
        assert_eq!(out.collapse_bands.len(), 14);
        for bands in [&out.index_bands, &out.collapse_bands] {
            for i in 0..bands.len() {
                assert!(bands.p10[i] <= bands.p50[i] + 1e-12);
                assert!(bands.p50[i] <= bands.p90[i] + 1e-12);
            }
        }
        assert!(out.status.is_complete());
        assert_eq!(out.runs_completed, 100);
    }

    #[test]
    fn test_zero_noise_without_shock_stays_at_base() {
        let mut input = small_input();
        input.settings.noise_multiplier = 0.0;
        let out = simulate(&input).unwrap();
        let base_index = MetricVector::neutral().life_index(None);
        for v in &out.index_bands.p50 {
            assert!((v - base_index).abs() < 1e-9);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let input = small_input().with_scenario(Scenario::sleep_crunch());
        let seq = serde_json::to_string(&simulate(&input).unwrap()).unwrap();
        let par = serde_json::to_string(&simulate_parallel(&input).unwrap()).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_cancelled_run_is_reported_partial() {
        let input = small_input();
        let cancel = CancelFlag::new();
        let flag = cancel.clone();
        let out = simulate_with(&input, &cancel, move |done, _| {
            if done == 10 {
                flag.cancel();
            }
        })
        .unwrap();
        assert_eq!(out.status, RunStatus::Cancelled { completed: 10 });
        assert_eq!(out.runs_completed, 10);
        assert_eq!(out.tail.index.summary.sample_count, 10);
    }

    #[test]
    fn test_progress_strictly_increasing() {
        let mut seen = Vec::new();
        simulate_with(&small_input(), &CancelFlag::new(), |done, total| {
            assert_eq!(total, 100);
            seen.push(done);
        })
        .unwrap();
        assert_eq!(seen, (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut input = small_input();
        input.settings.simulation_count = 7;
        assert!(simulate(&input).is_err());
    }

    #[test]
    fn test_step_shock_moves_first_day() {
        let mut input = small_input();
        input.settings.noise_multiplier = 0.0;
        let shocked = input
            .clone()
            .with_scenario(Scenario::new("cut", vec![ScenarioShock::step(MetricId::SleepHours, -3.0, 0)]));
        let calm = simulate(&input).unwrap();
        let hit = simulate(&shocked).unwrap();
        assert!(hit.index_bands.p50[0] < calm.index_bands.p50[0]);
        assert!(hit.collapse_bands.p50[0] > calm.collapse_bands.p50[0]);
    }

    #[test]
    fn test_ring_starts_from_history_tail() {
        let day = |v: f64| MetricVector::neutral().with(MetricId::Mood, v);
        let history = vec![day(2.0), day(3.0), day(4.0)];
        let base = day(5.0);
        let moods = |ring: VecDeque<MetricVector>| ring.iter().map(|m| m.get(MetricId::Mood)).collect::<Vec<_>>();

        assert_eq!(moods(seed_ring(&base, &history, 1)), vec![5.0]);
        assert_eq!(moods(seed_ring(&base, &history, 3)), vec![3.0, 4.0, 5.0]);
        assert_eq!(moods(seed_ring(&base, &history, 6)), vec![2.0, 2.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(moods(seed_ring(&base, &[], 3)), vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_lagged_history_feeds_influence() {
        // Sleep drives energy in the default graph; only the lagged day differs
        let tired = MetricVector::neutral().with(MetricId::SleepHours, 4.0);
        let settings = SimulationSettings::default()
            .with_horizon_days(3)
            .with_simulation_count(100)
            .with_noise_multiplier(0.0)
            .with_lag(2);
        let rested = SimulationInput::new(MetricVector::neutral()).with_settings(settings.clone());
        let after_bad_night = rested.clone().with_history(vec![tired]);

        let a = simulate(&rested).unwrap();
        let b = simulate(&after_bad_night).unwrap();
        assert!(b.index_bands.p50[0] < a.index_bands.p50[0]);
    }

    #[test]
    fn test_step_shock_persists_without_pull_back() {
        let mut input = small_input().with_matrix(InfluenceMatrix::empty());
        input.settings.noise_multiplier = 0.0;
        let shocked =
            input.with_scenario(Scenario::new("cut", vec![ScenarioShock::step(MetricId::SleepHours, -1.0, 0)]));
        let out = simulate(&shocked).unwrap();
        let day0 = out.index_bands.p50[0];
        for v in &out.index_bands.p50 {
            assert!((v - day0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_outcome_carries_regime_outlook() {
        let out = simulate(&small_input()).unwrap();
        assert_eq!(out.regime_outlook.horizon_days, 14);
        assert_eq!(out.regime_outlook.observations, 0);
        let total: f64 = out.regime_outlook.distribution.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
