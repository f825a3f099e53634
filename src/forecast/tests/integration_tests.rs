//! Integration tests for the full forecasting pipeline.
//!
//! These tests verify that components work together correctly:
//! - Impulse propagation over the default graph
//! - Synthetic history through classification and simulation
//! - Background lane against a direct run
//! - Policy evaluation across every mode with audit persistence
//! - Config-driven runs

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::forecast::config::ForecastConfig;
    use crate::forecast::influence::{explain_drivers, propagate, InfluenceMatrix};
    use crate::forecast::metrics::{MetricId, MetricVector};
    use crate::forecast::policy::{
        evaluate, evaluate_all_modes, ActionCatalog, AuditSink, EvaluationOptions,
        MemoryAuditSink, PolicyConstraints, PolicyMode, PolicyState, HOLD_ACTION_ID,
    };
    use crate::forecast::risk::{
        classify, regime_outlook, HistoryContext, RegimeId, RegimeTransitionModel,
    };
    use crate::forecast::simulation::{
        simulate, synthetic_history, LaneResult, Scenario, SimulationInput, SimulationLane,
        SimulationSettings,
    };

    fn concrete_base() -> MetricVector {
        MetricVector::from_readings([
            (MetricId::Energy, 5.0),
            (MetricId::Focus, 5.0),
            (MetricId::Mood, 5.0),
            (MetricId::Stress, 5.0),
            (MetricId::SleepHours, 7.0),
            (MetricId::Social, 5.0),
            (MetricId::Productivity, 5.0),
            (MetricId::Health, 5.0),
            (MetricId::CashFlow, 0.0),
        ])
    }

    // =========================================================================
    // Propagation
    // =========================================================================

    #[test]
    fn test_sleep_impulse_cascades_to_energy() {
        let base = concrete_base();
        let matrix = InfluenceMatrix::default_graph();
        let impulses = BTreeMap::from([(MetricId::SleepHours, 1.0)]);

        let first = propagate(&base, &impulses, &matrix, 2);
        let second = propagate(&base, &impulses, &matrix, 2);

        assert!(first.get(MetricId::Energy) > 5.0);
        assert_eq!(first, second);

        let drivers = explain_drivers(&first, &base, &matrix, 3);
        assert!(!drivers.is_empty());
        assert_eq!(drivers[0].from, MetricId::SleepHours);
    }

    // =========================================================================
    // History -> classifier -> regime model
    // =========================================================================

    #[test]
    fn test_synthetic_history_feeds_classifier_and_regimes() {
        let history = synthetic_history(60, 11);
        let mut context = HistoryContext::new();
        let mut labels = Vec::with_capacity(history.len());
        for snapshot in &history {
            let out = classify(snapshot, &context);
            assert!((0.0..=1.0).contains(&out.p_collapse));
            assert!((0.0..=100.0).contains(&out.index));
            context.push(out.index);
            labels.push(out.regime_id);
        }

        let model = RegimeTransitionModel::from_labels(&labels, 90);
        let current = labels.last().copied().unwrap_or(RegimeId::WORST);
        let next = model.predict_next(current, 3);
        assert!((next.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        // Same projection when the last day is the current snapshot
        let (today, past) = history.split_last().unwrap();
        let outlook = regime_outlook(past, today, 3);
        assert_eq!(outlook.current, current);
        assert_eq!(outlook.distribution, next);
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    fn history_input() -> SimulationInput {
        let history = synthetic_history(30, 5);
        let base = history.last().copied().unwrap_or_default();
        SimulationInput::new(base)
            .with_history(history)
            .with_settings(
                SimulationSettings::default()
                    .with_horizon_days(14)
                    .with_simulation_count(100)
                    .with_seed(2024),
            )
    }

    #[test]
    fn test_simulation_from_synthetic_history() {
        let outcome = simulate(&history_input()).unwrap();
        assert!(outcome.status.is_complete());
        assert_eq!(outcome.runs_completed, 100);
        assert_eq!(outcome.index_bands.len(), 14);
        assert!((0.0..=1.0).contains(&outcome.p_ever_red));
        assert!(!outcome.recommendations.is_empty());
    }

    #[test]
    fn test_scenario_preset_lowers_index_tail() {
        let baseline = simulate(&history_input()).unwrap();
        let crunched = simulate(&history_input().with_scenario(Scenario::burnout())).unwrap();
        assert!(crunched.tail.index.expected_shortfall <= baseline.tail.index.expected_shortfall);
    }

    #[tokio::test]
    async fn test_lane_matches_direct_run() {
        let input = history_input();
        let direct = simulate(&input).unwrap();

        let handle = SimulationLane::spawn(1, input);
        let mut seen = Vec::new();
        let result = handle
            .finish_with(|done, total| seen.push((done, total)))
            .await
            .unwrap();

        match result {
            LaneResult::Done(outcome) => {
                assert_eq!(outcome.index_bands, direct.index_bands);
                assert_eq!(outcome.tail, direct.tail);
            }
            LaneResult::Cancelled(_) => panic!("lane was not cancelled"),
        }
        assert_eq!(seen.last(), Some(&(100, 100)));
        assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
    }

    // =========================================================================
    // Policy
    // =========================================================================

    fn policy_state() -> PolicyState {
        let history = synthetic_history(30, 8);
        let snapshot = history.last().copied().unwrap_or_default();
        PolicyState::from_snapshot(snapshot, &history[..history.len() - 1], None)
    }

    #[test]
    fn test_all_modes_return_ranked_decisions() {
        let state = policy_state();
        let catalog = ActionCatalog::default();
        let decisions = evaluate_all_modes(
            &state,
            &catalog,
            &PolicyConstraints::default(),
            &EvaluationOptions::default(),
        )
        .unwrap();

        assert_eq!(decisions.len(), PolicyMode::ALL.len());
        for decision in &decisions {
            assert!(!decision.candidates.is_empty());
            assert!(decision.audit.verify(&state.clone().sanitized(), &catalog));
            for (i, c) in decision.candidates.iter().enumerate() {
                assert_eq!(c.rank, i + 1);
                assert!(c.score.is_finite());
            }
        }
    }

    #[test]
    fn test_fallback_in_every_mode_under_impossible_constraints() {
        let constraints = PolicyConstraints {
            max_fail_rate: -1.0,
            ..Default::default()
        };
        let decisions = evaluate_all_modes(
            &policy_state(),
            &ActionCatalog::default(),
            &constraints,
            &EvaluationOptions::default(),
        )
        .unwrap();

        for decision in decisions {
            assert!(decision.fallback);
            assert_eq!(decision.candidates.len(), 1);
            assert_eq!(decision.candidates[0].action_id, HOLD_ACTION_ID);
        }
    }

    #[tokio::test]
    async fn test_decision_audit_persisted() {
        let state = policy_state();
        let catalog = ActionCatalog::default();
        let decision = evaluate(
            &state,
            &catalog,
            &PolicyConstraints::default(),
            PolicyMode::Balanced,
            &EvaluationOptions::default().with_seed(77),
        )
        .unwrap();

        let sink = MemoryAuditSink::new();
        sink.persist(&decision.audit).await.unwrap();
        let records = sink.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].token().seed, 77);
        assert_eq!(records[0].mode(), PolicyMode::Balanced);
    }

    // =========================================================================
    // Config
    // =========================================================================

    #[test]
    fn test_config_drives_simulation_and_policy() {
        let config = ForecastConfig::from_toml(
            r#"
[simulation]
horizonDays = 7
simulationCount = 50

[policy]
horizons = [3]
top_k = 2

[influence.weights_source]
kind = "learned"
"#,
        )
        .unwrap();
        config.validate().unwrap();
        let options = config.evaluation_options().unwrap();
        // No learned file configured
        assert_eq!(options.matrix, InfluenceMatrix::default_graph());

        let input = SimulationInput::new(concrete_base())
            .with_matrix(config.influence.active_matrix().unwrap())
            .with_settings(config.simulation.clone());
        let outcome = simulate(&input).unwrap();
        assert_eq!(outcome.horizon_days, 7);
        assert_eq!(outcome.runs_completed, 50);

        let decision = evaluate(
            &policy_state(),
            &ActionCatalog::default(),
            &config.policy.constraints,
            config.policy.mode,
            &options,
        )
        .unwrap();
        assert!(decision.candidates.len() <= 2);
        assert!(decision.candidates.iter().all(|c| c.horizon_results.len() == 1));
    }
}
