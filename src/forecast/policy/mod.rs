//! Policy rollout evaluator.
//!
//! ```text
//! PolicyState ──► screen (precondition, shock gate)
//!             ──► rollout per horizon (discounted, loss-averse, tail signal)
//!             ──► fail-rate exclusion ──► rank ──► top-K or hold
//!             ──► AuditRecord (content-hashed inputs)
//! ```

pub mod actions;
pub mod audit;
pub mod catalog;
pub mod constraints;
pub mod cost;
pub mod evaluator;
pub mod mode;
pub mod rollout;
pub mod state;

pub use actions::{
    ActionContext, ActionCost, ActionDefinition, ActionDomain, ActionTag, EffectParams,
    EffectShape, Precondition, HOLD_ACTION_ID,
};
pub use audit::{
    canonical_json, content_hash, fnv1a32, AuditRecord, AuditSink, CandidateSummary,
    JsonLinesAuditSink, MemoryAuditSink, ReproToken, StoredAudit, MAX_JUSTIFICATIONS,
};
pub use catalog::{ActionCatalog, CATALOG_VERSION};
pub use constraints::PolicyConstraints;
pub use cost::{penalty_score, BudgetEnvelope, CostAssessment, COST_DIMENSIONS};
pub use evaluator::{
    evaluate, evaluate_all_modes, horizon_weights, EvaluationOptions, FilterReason,
    FilteredAction, PolicyDecision, RankedCandidate, DEFAULT_HORIZONS, DEFAULT_TOP_K,
};
pub use mode::{ModeWeights, PolicyMode};
pub use rollout::{rollout, tail_signal, RolloutEnv, RolloutResult, RolloutStats, DISCOUNT, LOSS_AVERSION};
pub use state::{recovery_score, PolicyState, DEFAULT_SHOCK_BUDGET};
