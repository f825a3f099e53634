//! Risk-state classification.
//!
//! - [`classifier`]: collapse probability, siren grade and regime for a snapshot
//! - [`regime`]: regime labels and the empirical Markov transition model

pub mod classifier;
pub mod regime;

pub use classifier::{
    classify, label_history, regime_outlook, siren_risk, ClassifierOutput, HistoryContext,
    SirenLevel, SubsystemReliability, TREND_WINDOW, VOLATILITY_WINDOW,
};
pub use regime::{
    RegimeId, RegimeOutlook, RegimeTransitionModel, DEFAULT_LABEL_WINDOW, NUM_REGIMES,
};
