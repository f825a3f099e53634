//! Cohort drivers and recommendations derived from a finished simulation.

use serde::{Deserialize, Serialize};

use crate::consts::SIREN_RED_THRESHOLD;
use crate::forecast::metrics::{MetricId, NUM_METRICS};
use crate::forecast::tail::DirectionalShortfall;

/// Drivers reported per simulation.
pub const TOP_DRIVERS: usize = 3;
/// Share of runs crossing the collapse threshold that counts as "likely".
const BREACH_LIKELY_SHARE: f64 = 0.5;

/// A metric whose run-mean differs between ever-red and never-red runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortDriver {
    pub metric_id: MetricId,
    pub ever_red_mean: f64,
    pub never_red_mean: f64,
    /// `ever_red_mean - never_red_mean` in metric units
    pub difference: f64,
    /// `|difference|` divided by the metric's domain span; the ranking key
    pub normalized_gap: f64,
}

impl CohortDriver {
    /// True when the ever-red cohort sits on the bad side of this metric.
    pub fn is_adverse(&self) -> bool {
        if self.metric_id.higher_is_better() {
            self.difference < 0.0
        } else {
            self.difference > 0.0
        }
    }
}

/// Rank metrics by normalized cohort gap, ties by lexical metric id.
///
/// `runs` pairs each run's ever-red flag with its per-metric mean. Returns an
/// empty list when either cohort is empty.
pub fn cohort_drivers(runs: &[(bool, [f64; NUM_METRICS])], top_n: usize) -> Vec<CohortDriver> {
    let mut red_sum = [0.0; NUM_METRICS];
    let mut calm_sum = [0.0; NUM_METRICS];
    let (mut red_n, mut calm_n) = (0usize, 0usize);

    for (ever_red, means) in runs {
        let target = if *ever_red {
            red_n += 1;
            &mut red_sum
        } else {
            calm_n += 1;
            &mut calm_sum
        };
        for (acc, m) in target.iter_mut().zip(means.iter()) {
            *acc += m;
        }
    }
    if red_n == 0 || calm_n == 0 {
        return Vec::new();
    }

    let mut drivers: Vec<CohortDriver> = MetricId::ALL
        .iter()
        .map(|&id| {
            let i = id.index();
            let ever_red_mean = red_sum[i] / red_n as f64;
            let never_red_mean = calm_sum[i] / calm_n as f64;
            let difference = ever_red_mean - never_red_mean;
            let span = id.domain().span();
            CohortDriver {
                metric_id: id,
                ever_red_mean,
                never_red_mean,
                difference,
                normalized_gap: if span > 0.0 { difference.abs() / span } else { 0.0 },
            }
        })
        .collect();

    drivers.sort_by(|a, b| {
        b.normalized_gap
            .total_cmp(&a.normalized_gap)
            .then_with(|| a.metric_id.lexical_cmp(&b.metric_id))
    });
    drivers.truncate(top_n);
    drivers
}

/// Machine-readable recommendation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationCode {
    ProtectMetric,
    TailRiskElevated,
    ThresholdBreachLikely,
    StableOutlook,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub code: RecommendationCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_id: Option<MetricId>,
    pub message: String,
}

/// Turn drivers and tail statistics into recommendations.
pub fn recommend(
    drivers: &[CohortDriver],
    collapse_tail: &DirectionalShortfall,
    p_threshold_crossed: f64,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    for driver in drivers.iter().filter(|d| d.is_adverse()) {
        out.push(Recommendation {
            code: RecommendationCode::ProtectMetric,
            metric_id: Some(driver.metric_id),
            message: format!(
                "protect {}: runs that hit red averaged {:.2} against {:.2} in calm runs",
                driver.metric_id, driver.ever_red_mean, driver.never_red_mean
            ),
        });
    }

    if collapse_tail.summary.sample_count > 0 && collapse_tail.expected_shortfall > SIREN_RED_THRESHOLD {
        out.push(Recommendation {
            code: RecommendationCode::TailRiskElevated,
            metric_id: None,
            message: format!(
                "worst {:.0}% of runs end with collapse probability {:.2}",
                collapse_tail.worst_fraction * 100.0,
                collapse_tail.expected_shortfall
            ),
        });
    }

    if p_threshold_crossed >= BREACH_LIKELY_SHARE {
        out.push(Recommendation {
            code: RecommendationCode::ThresholdBreachLikely,
            metric_id: None,
            message: format!(
                "{:.0}% of runs cross the collapse threshold",
                p_threshold_crossed * 100.0
            ),
        });
    }

    if out.is_empty() {
        out.push(Recommendation {
            code: RecommendationCode::StableOutlook,
            metric_id: None,
            message: "no elevated risk signal over the horizon".to_string(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::tail::{expected_shortfall, TailDirection};

    fn means(sleep: f64, stress: f64) -> [f64; NUM_METRICS] {
        let mut m = [5.0; NUM_METRICS];
        m[MetricId::SleepHours.index()] = sleep;
        m[MetricId::Stress.index()] = stress;
        m[MetricId::CashFlow.index()] = 0.0;
        m
    }

    #[test]
    fn test_cohort_drivers_rank_by_normalized_gap() {
        let runs = vec![
            (true, means(4.0, 6.0)),
            (true, means(4.0, 6.0)),
            (false, means(8.0, 5.0)),
        ];
        let drivers = cohort_drivers(&runs, TOP_DRIVERS);
        assert_eq!(drivers.len(), TOP_DRIVERS);
        // sleep gap 4/14, stress gap 1/10
        assert_eq!(drivers[0].metric_id, MetricId::SleepHours);
        assert_eq!(drivers[1].metric_id, MetricId::Stress);
        assert!(drivers[0].is_adverse());
        assert!(drivers[1].is_adverse());
        // remaining metrics tie at zero and fall back to lexical order
        assert_eq!(drivers[2].metric_id, MetricId::CashFlow);
    }

    #[test]
    fn test_cohort_drivers_empty_when_one_cohort_missing() {
        let runs = vec![(false, means(8.0, 5.0)), (false, means(7.0, 5.0))];
        assert!(cohort_drivers(&runs, TOP_DRIVERS).is_empty());
    }

    #[test]
    fn test_recommend_stable_when_quiet() {
        let tail = expected_shortfall(&[0.05, 0.06, 0.07], 0.1, TailDirection::Upper);
        let recs = recommend(&[], &tail, 0.0);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].code, RecommendationCode::StableOutlook);
    }

    #[test]
    fn test_recommend_flags_tail_and_breach() {
        let tail = expected_shortfall(&[0.3, 0.5, 0.6], 0.1, TailDirection::Upper);
        let recs = recommend(&[], &tail, 0.8);
        let codes: Vec<_> = recs.iter().map(|r| r.code).collect();
        assert_eq!(
            codes,
            vec![
                RecommendationCode::TailRiskElevated,
                RecommendationCode::ThresholdBreachLikely
            ]
        );
    }

    #[test]
    fn test_recommendation_code_kebab_case() {
        let json = serde_json::to_string(&RecommendationCode::ProtectMetric).unwrap();
        assert_eq!(json, "\"protect-metric\"");
    }
}
