//! Personal-state forecasting and decision engine.
//!
//! This module provides:
//! - **Metrics**: the fixed nine-metric snapshot and its domains
//! - **Influence**: directed metric-to-metric propagation
//! - **Risk**: collapse probability, siren grade and regime classification
//! - **Tail**: Value-at-Risk and Expected Shortfall over outcome samples
//! - **Simulation**: seeded Monte Carlo scenarios with a background lane
//! - **Policy**: tail-aware rollout ranking of candidate actions with audit records
//!
//! Everything except the lane and the audit sinks is synchronous and pure: the
//! same inputs and seed produce identical outputs.

pub mod config;
pub mod influence;
pub mod infra;
pub mod metrics;
pub mod policy;
pub mod risk;
pub mod simulation;
pub mod tail;

mod tests;

pub use config::{generate_config, load_config, ForecastConfig, InfluenceConfig, PolicyConfig};
pub use influence::{
    explain_drivers, influence_contributions, propagate, DriverContribution, InfluenceEdge,
    InfluenceMatrix, InfluenceSet, WeightsSource,
};
pub use infra::{init_logging, LogConfig, LogFormat};
pub use metrics::{GoalWeights, MetricDeltas, MetricDomain, MetricId, MetricVector};
pub use policy::{
    evaluate, evaluate_all_modes, ActionCatalog, ActionDefinition, AuditRecord, AuditSink,
    EvaluationOptions, JsonLinesAuditSink, MemoryAuditSink, PolicyConstraints, PolicyDecision,
    PolicyMode, PolicyState, RankedCandidate,
};
pub use risk::{
    classify, regime_outlook, ClassifierOutput, HistoryContext, RegimeId, RegimeOutlook,
    RegimeTransitionModel, SirenLevel,
};
pub use simulation::{
    simulate, simulate_parallel, simulate_with, CancelFlag, LaneEvent, LaneEventKind, LaneHandle,
    LaneResult, Scenario, ScenarioShock, SimulationInput, SimulationLane, SimulationOutcome,
    SimulationSettings,
};
pub use tail::{
    compute_tail_risk, expected_shortfall, DirectionalShortfall, TailDirection, TailRiskSummary,
    TailWarning,
};
