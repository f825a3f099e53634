//! Synthetic daily history for demos and tests.
//!
//! Uses [`Lcg64`], not the simulation-path generator; outputs here are not
//! part of any determinism fixture beyond "same seed, same history".

use super::rng::Lcg64;
use crate::forecast::metrics::{MetricId, MetricVector};

/// Fraction of the gap to neutral closed each day.
const PULL_TO_NEUTRAL: f64 = 0.2;
/// Weekly rhythm amplitude in domain units (fraction of span).
const WEEKLY_AMPLITUDE: f64 = 0.04;
/// Daily jitter (fraction of span).
const DAILY_JITTER: f64 = 0.06;

/// `days` snapshots, oldest first, snapped to each metric's step.
pub fn synthetic_history(days: usize, seed: u64) -> Vec<MetricVector> {
    let mut rng = Lcg64::new(seed);
    let mut current = MetricVector::neutral();
    let mut out = Vec::with_capacity(days);

    for day in 0..days {
        // Weekend bump to sleep/social, dip to productivity.
        let weekend = if day % 7 >= 5 { 1.0 } else { -0.4 };
        let mut next = current;
        for id in MetricId::ALL {
            let domain = id.domain();
            let span = domain.span();
            let rhythm = match id {
                MetricId::SleepHours | MetricId::Social | MetricId::Mood => weekend,
                MetricId::Productivity | MetricId::Focus => -weekend,
                _ => 0.0,
            };
            let prev = current.get(id);
            let value = prev
                + PULL_TO_NEUTRAL * (id.neutral() - prev)
                + WEEKLY_AMPLITUDE * span * rhythm * 0.5
                + DAILY_JITTER * span * rng.next_signed();
            next.set(id, domain.snap(value));
        }
        out.push(next);
        current = next;
    }
    out
}
