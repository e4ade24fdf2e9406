use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use verdant_common::types::{
    Condition, Measurement, Parameter, RawMeasurement, RuleActions, SensorRule,
};
use verdant_notify::dispatcher::Dispatcher;
use verdant_store::memory::MemoryBackend;
use verdant_store::rules::{CreateSensorRule, RuleStore};
use verdant_store::Capabilities;

use crate::config::EngineConfig;
use crate::engine::RuleEngine;
use crate::error::EngineError;
use crate::runtime::{EngineRuntime, EngineState};
use crate::tracker::Phase;
use crate::{evaluator, tracker::EvaluationState};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn minutes(n: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(n)
}

fn make_rule(
    id: &str,
    plant_id: Option<&str>,
    parameter: Parameter,
    condition: Condition,
    threshold: f64,
    duration_minutes: u32,
) -> SensorRule {
    SensorRule {
        id: id.to_string(),
        user_id: "user-1".to_string(),
        plant_id: plant_id.map(String::from),
        parameter,
        condition,
        threshold,
        duration_minutes,
        actions: RuleActions {
            notification: true,
            ..Default::default()
        },
        enabled: true,
        created_at: t0(),
        updated_at: t0(),
    }
}

fn reading(plant: &str, parameter: Parameter, value: f64, at: DateTime<Utc>) -> Measurement {
    Measurement {
        plant_id: plant.to_string(),
        parameter,
        value,
        timestamp: at,
    }
}

// ── Condition evaluator ──

#[test]
fn evaluator_covers_all_operators() {
    let cases = [
        (Condition::LessThan, 5.0, 5.5, true),
        (Condition::LessThan, 5.5, 5.5, false),
        (Condition::LessEqual, 5.5, 5.5, true),
        (Condition::LessEqual, 5.6, 5.5, false),
        (Condition::GreaterThan, 28.1, 28.0, true),
        (Condition::GreaterThan, 28.0, 28.0, false),
        (Condition::GreaterEqual, 28.0, 28.0, true),
        (Condition::GreaterEqual, 27.9, 28.0, false),
    ];

    for (condition, value, threshold, expected) in cases {
        let rule = make_rule("r", None, Parameter::Ph, condition, threshold, 0);
        let m = reading("plant-1", Parameter::Ph, value, t0());
        assert_eq!(
            evaluator::holds(&rule, &m),
            expected,
            "{value} {condition} {threshold}"
        );
    }
}

#[test]
fn rule_scope_rules_out_mismatches() {
    let scoped = make_rule(
        "r",
        Some("plant-1"),
        Parameter::Ph,
        Condition::LessThan,
        5.5,
        0,
    );

    // Same parameter, different plant.
    let other_plant = reading("plant-2", Parameter::Ph, 5.0, t0());
    assert!(!evaluator::applies(&scoped, &other_plant));

    // Same plant, different parameter.
    let other_parameter = reading("plant-1", Parameter::Ec, 5.0, t0());
    assert!(!evaluator::applies(&scoped, &other_parameter));

    // Global rules cover every plant.
    let global = make_rule("g", None, Parameter::Ph, Condition::LessThan, 5.5, 0);
    assert!(evaluator::applies(&global, &other_plant));

    // Disabled rules are never in scope.
    let mut disabled = scoped.clone();
    disabled.enabled = false;
    let matching = reading("plant-1", Parameter::Ph, 5.0, t0());
    assert!(!evaluator::applies(&disabled, &matching));
}

// ── Duration tracker ──

#[test]
fn tracker_fires_once_per_episode() {
    let mut state = EvaluationState::new();

    assert!(!state.observe(true, minutes(0), 10));
    assert_eq!(state.phase(), Phase::Accumulating);
    assert!(!state.observe(true, minutes(5), 10));
    assert!(state.observe(true, minutes(10), 10), "fires at the boundary");
    assert_eq!(state.phase(), Phase::Triggered);

    // Still the same episode: no second fire.
    assert!(!state.observe(true, minutes(11), 10));
    assert!(!state.observe(true, minutes(60), 10));

    // Condition goes false: reset to idle.
    assert!(!state.observe(false, minutes(61), 10));
    assert_eq!(state.phase(), Phase::Idle);
    assert_eq!(state.condition_true_since(), None);
}

#[test]
fn tracker_duration_zero_fires_immediately() {
    let mut state = EvaluationState::new();
    assert!(state.observe(true, minutes(0), 0));
    assert_eq!(state.phase(), Phase::Triggered);
    assert!(!state.observe(true, minutes(1), 0));
}

#[test]
fn tracker_false_reading_resets_accumulation() {
    let mut state = EvaluationState::new();

    assert!(!state.observe(true, minutes(0), 10));
    assert!(!state.observe(false, minutes(5), 10));
    assert_eq!(state.phase(), Phase::Idle);

    // Fresh episode accumulates from its own start, not the old one.
    assert!(!state.observe(true, minutes(6), 10));
    assert!(!state.observe(true, minutes(15), 10), "only 9 minutes in");
    assert!(state.observe(true, minutes(16), 10));
}

// ── Engine ──

#[test]
fn sustained_ph_scenario_dispatches_once_then_resets() {
    let rule = make_rule(
        "ph-low",
        None,
        Parameter::Ph,
        Condition::LessThan,
        5.5,
        10,
    );
    let mut engine = RuleEngine::new(vec![rule]);

    // pH 5.0 at t=0, 5, 10 minutes: fires at t=10 and only there.
    assert!(engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(0)))
        .unwrap()
        .is_empty());
    assert!(engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(5)))
        .unwrap()
        .is_empty());

    let fired = engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(10)))
        .unwrap();
    assert_eq!(fired.len(), 1);
    let event = &fired[0].event;
    assert_eq!(event.rule_id, "ph-low");
    assert_eq!(event.plant_id, "plant-1");
    assert_eq!(event.value, 5.0);
    assert_eq!(event.triggered_at, minutes(10));
    assert!(event.message.contains("below 5.5"));

    // Same episode: a further true reading does not re-fire.
    assert!(engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.2, minutes(11)))
        .unwrap()
        .is_empty());

    // pH recovers at t=12: back to idle.
    assert!(engine
        .ingest(&reading("plant-1", Parameter::Ph, 6.0, minutes(12)))
        .unwrap()
        .is_empty());

    // New episode starts at t=13, not t=0: no fire until t=23.
    assert!(engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(13)))
        .unwrap()
        .is_empty());
    let state = engine.state("ph-low", "plant-1").unwrap();
    assert_eq!(state.condition_true_since(), Some(minutes(13)));

    assert!(engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(22)))
        .unwrap()
        .is_empty());
    let fired = engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(23)))
        .unwrap();
    assert_eq!(fired.len(), 1);
}

#[test]
fn plant_scoped_rule_ignores_other_plants() {
    let rule = make_rule(
        "temp-high",
        Some("plant-1"),
        Parameter::Temperature,
        Condition::GreaterThan,
        30.0,
        0,
    );
    let mut engine = RuleEngine::new(vec![rule]);

    let fired = engine
        .ingest(&reading("plant-2", Parameter::Temperature, 35.0, minutes(0)))
        .unwrap();
    assert!(fired.is_empty());

    let fired = engine
        .ingest(&reading("plant-1", Parameter::Temperature, 35.0, minutes(1)))
        .unwrap();
    assert_eq!(fired.len(), 1);
}

#[test]
fn global_rule_tracks_each_plant_independently() {
    let rule = make_rule(
        "ec-high",
        None,
        Parameter::Ec,
        Condition::GreaterEqual,
        2.5,
        10,
    );
    let mut engine = RuleEngine::new(vec![rule]);

    engine
        .ingest(&reading("plant-a", Parameter::Ec, 2.8, minutes(0)))
        .unwrap();
    engine
        .ingest(&reading("plant-b", Parameter::Ec, 2.8, minutes(2)))
        .unwrap();

    // plant-a completes its 10 minutes first; plant-b is still accumulating.
    let fired = engine
        .ingest(&reading("plant-a", Parameter::Ec, 2.9, minutes(10)))
        .unwrap();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].event.plant_id, "plant-a");

    // plant-b going false does not disturb plant-a's episode.
    engine
        .ingest(&reading("plant-b", Parameter::Ec, 1.0, minutes(11)))
        .unwrap();
    assert_eq!(
        engine.state("ec-high", "plant-a").unwrap().phase(),
        Phase::Triggered
    );
    assert_eq!(
        engine.state("ec-high", "plant-b").unwrap().phase(),
        Phase::Idle
    );
}

#[test]
fn stale_measurement_is_rejected_not_fatal() {
    let rule = make_rule("ph-low", None, Parameter::Ph, Condition::LessThan, 5.5, 10);
    let mut engine = RuleEngine::new(vec![rule]);

    engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(10)))
        .unwrap();

    let err = engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(5)))
        .unwrap_err();
    assert!(matches!(err, EngineError::StaleMeasurement { .. }));

    // The pair's accounting is untouched and later readings still work.
    let state = engine.state("ph-low", "plant-1").unwrap();
    assert_eq!(state.condition_true_since(), Some(minutes(10)));
    engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(11)))
        .unwrap();

    // A stale reading on one key does not affect other keys.
    engine
        .ingest(&reading("plant-2", Parameter::Ph, 5.0, minutes(5)))
        .unwrap();
}

#[test]
fn replace_rules_reconciles_episode_state() {
    let rule = make_rule("ph-low", None, Parameter::Ph, Condition::LessThan, 5.5, 10);
    let mut engine = RuleEngine::new(vec![rule.clone()]);

    engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(0)))
        .unwrap();
    assert!(engine.state("ph-low", "plant-1").is_some());

    // Unchanged rule: the running episode survives a refresh.
    engine.replace_rules(vec![rule.clone()]);
    assert_eq!(
        engine
            .state("ph-low", "plant-1")
            .unwrap()
            .condition_true_since(),
        Some(minutes(0))
    );

    // Edited rule (updated_at bumped): episode resets.
    let mut edited = rule.clone();
    edited.threshold = 6.0;
    edited.updated_at = minutes(1);
    engine.replace_rules(vec![edited.clone()]);
    assert!(engine.state("ph-low", "plant-1").is_none());

    // Disabled rule: state discarded and no evaluation.
    engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(2)))
        .unwrap();
    assert!(engine.state("ph-low", "plant-1").is_some());
    let mut disabled = edited.clone();
    disabled.enabled = false;
    engine.replace_rules(vec![disabled]);
    assert!(engine.state("ph-low", "plant-1").is_none());
    assert!(engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(3)))
        .unwrap()
        .is_empty());

    // Deleted rule: state discarded.
    let rule2 = make_rule("ph-low-2", None, Parameter::Ph, Condition::LessThan, 5.5, 10);
    engine.replace_rules(vec![rule2.clone()]);
    engine
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(4)))
        .unwrap();
    assert!(engine.state("ph-low-2", "plant-1").is_some());
    engine.replace_rules(Vec::new());
    assert!(engine.state("ph-low-2", "plant-1").is_none());
}

// ── Runtime ──

async fn runtime_with_rule() -> (Arc<RuleStore>, EngineRuntime) {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(RuleStore::new(backend, "user-1", Capabilities::full()));
    store
        .create(CreateSensorRule {
            plant_id: Some("plant-1".into()),
            parameter: "ph".into(),
            condition: "<".into(),
            threshold: 5.5,
            duration_minutes: 0,
            actions: RuleActions {
                notification: true,
                ..Default::default()
            },
            enabled: true,
        })
        .await
        .unwrap();

    // No gateways configured: dispatch records failed outcomes, which is
    // all the runtime tests need to observe.
    let dispatcher = Arc::new(Dispatcher::new(Vec::new()));
    let runtime = EngineRuntime::new(store.clone(), dispatcher, &EngineConfig::default());
    (store, runtime)
}

#[tokio::test]
async fn runtime_lifecycle_transitions() {
    let (_, runtime) = runtime_with_rule().await;
    assert_eq!(runtime.state(), EngineState::Stopped);

    runtime.start().await.unwrap();
    assert_eq!(runtime.state(), EngineState::Running);
    assert!(matches!(
        runtime.start().await.unwrap_err(),
        EngineError::AlreadyRunning
    ));

    runtime.stop().unwrap();
    assert_eq!(runtime.state(), EngineState::Stopped);
    assert!(matches!(runtime.stop().unwrap_err(), EngineError::Stopped));

    // Resumable: a stopped runtime can be started again.
    runtime.start().await.unwrap();
    assert_eq!(runtime.state(), EngineState::Running);
}

#[tokio::test]
async fn runtime_rejects_measurements_while_stopped() {
    let (_, runtime) = runtime_with_rule().await;
    let m = reading("plant-1", Parameter::Ph, 5.0, minutes(0));
    assert!(matches!(
        runtime.ingest(&m).unwrap_err(),
        EngineError::Stopped
    ));
}

#[tokio::test]
async fn runtime_dispatches_trigger_and_records_log() {
    let (store, runtime) = runtime_with_rule().await;
    runtime.start().await.unwrap();
    assert_eq!(runtime.health().rules_loaded, 1);

    runtime
        .ingest(&reading("plant-1", Parameter::Ph, 5.0, minutes(0)))
        .unwrap();

    // Dispatch is fire-and-forget; give the spawned task a moment.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let rows = store.list_dispatch_log(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].channel, "notification");
    assert!(!rows[0].delivered, "no gateway configured");
    assert_eq!(rows[0].plant_id, "plant-1");
}

#[tokio::test]
async fn runtime_batch_isolates_stale_items() {
    let (_, runtime) = runtime_with_rule().await;
    runtime.start().await.unwrap();

    let batch = [
        reading("plant-1", Parameter::Ph, 6.0, minutes(10)),
        reading("plant-1", Parameter::Ph, 6.0, minutes(5)), // stale
        reading("plant-1", Parameter::Ph, 6.0, minutes(11)),
    ];
    let results = runtime.ingest_batch(&batch);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1].as_ref().unwrap_err(),
        EngineError::StaleMeasurement { .. }
    ));
    assert!(results[2].is_ok());
}

#[tokio::test]
async fn runtime_raw_ingress_validates_parameter() {
    let (_, runtime) = runtime_with_rule().await;
    runtime.start().await.unwrap();

    let ok = RawMeasurement {
        plant_id: "plant-1".into(),
        parameter: "ph".into(),
        value: 6.5,
        timestamp: minutes(0),
    };
    runtime.ingest_raw(ok).unwrap();

    let bad = RawMeasurement {
        plant_id: "plant-1".into(),
        parameter: "humidity".into(),
        value: 40.0,
        timestamp: minutes(1),
    };
    assert!(matches!(
        runtime.ingest_raw(bad).unwrap_err(),
        EngineError::UnknownParameter(p) if p == "humidity"
    ));
}
