#![deny(unreachable_pub)]

// Core modules
mod consts;
mod errors;
mod prelude;

// Feature modules
pub mod forecast;

// Re-exports
pub use consts::{
    BUDGET_VIOLATION_PENALTY, BUILD_ID, EPSILON, POLICY_VERSION, SIREN_AMBER_THRESHOLD,
    SIREN_RED_THRESHOLD,
};
pub use errors::{ConfigError, ForecastError, LaneError};
pub use forecast::{
    classify, compute_tail_risk, evaluate, evaluate_all_modes, explain_drivers, propagate,
    simulate, simulate_parallel, ActionCatalog, ActionDefinition, AuditRecord, ClassifierOutput,
    ForecastConfig, HistoryContext, InfluenceMatrix, MetricId, MetricVector, PolicyConstraints,
    PolicyDecision, PolicyMode, PolicyState, RegimeId, ScenarioShock, SimulationInput,
    SimulationOutcome, SimulationSettings, SirenLevel, TailRiskSummary,
};
