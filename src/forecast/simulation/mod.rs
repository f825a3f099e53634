//! Monte Carlo scenario simulation.
//!
//! - [`engine`]: the seeded multi-run simulator and its aggregation
//! - [`lane`]: background execution with progress and cancellation
//! - [`drivers`]: cohort drivers and recommendations
//! - [`scenario`] / [`settings`]: inputs
//! - [`rng`]: the seeded generators
//! - [`synthetic`]: generated history for demos

pub mod drivers;
pub mod engine;
pub mod lane;
pub mod rng;
pub mod scenario;
pub mod settings;
pub mod synthetic;

pub use drivers::{CohortDriver, Recommendation, RecommendationCode, TOP_DRIVERS};
pub use engine::{
    simulate, simulate_parallel, simulate_with, CancelFlag, QuantileSeries, RunStatus,
    SimulationInput, SimulationOutcome, TailSummaries,
};
pub use lane::{LaneEvent, LaneEventKind, LaneHandle, LaneResult, SimulationLane};
pub use rng::{Lcg64, Mulberry32};
pub use scenario::{Scenario, ScenarioShock, ShockMode};
pub use settings::{SimulationSettings, HORIZON_DAYS, MAX_LAG, SIMULATION_COUNTS};
pub use synthetic::synthetic_history;
