pub static BUILD_ID: &str = concat!("lifecast-", env!("CARGO_PKG_VERSION"));
pub static POLICY_VERSION: &str = "policy-v3";

pub const EPSILON: f64 = 1e-9;

/// Alert thresholds on collapse probability.
pub const SIREN_RED_THRESHOLD: f64 = 0.35;
pub const SIREN_AMBER_THRESHOLD: f64 = 0.20;

/// Additive penalty per budget dimension that exceeds its ceiling.
pub const BUDGET_VIOLATION_PENALTY: f64 = 10_000.0;
