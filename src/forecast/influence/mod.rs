//! Influence propagation engine.

pub mod matrix;
pub mod propagation;

pub use matrix::{InfluenceEdge, InfluenceMatrix, InfluenceSet, WeightsSource};
pub use propagation::{
    explain_drivers, influence_contributions, propagate, DriverContribution,
    PROPAGATION_DAMPING,
};
