use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing;
use verdant_common::types::{Measurement, Parameter, SensorRule, TriggerEvent};

use crate::error::EngineError;
use crate::evaluator;
use crate::tracker::EvaluationState;

/// Key: (rule_id, plant_id)
type StateKey = (String, String);

/// A fired rule together with the event to dispatch for it.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub rule: SensorRule,
    pub event: TriggerEvent,
}

/// Synchronous evaluation core.
///
/// Holds the current rule cache, the latest reading per (plant, parameter),
/// and the per-(rule, plant) episode states. The runtime wraps it in a
/// mutex so measurements are processed one at a time, which preserves
/// duration accounting per key.
pub struct RuleEngine {
    rules: Vec<SensorRule>,
    states: HashMap<StateKey, EvaluationState>,
    latest: HashMap<(String, Parameter), Measurement>,
}

impl RuleEngine {
    pub fn new(rules: Vec<SensorRule>) -> Self {
        Self {
            rules,
            states: HashMap::new(),
            latest: HashMap::new(),
        }
    }

    pub fn rules(&self) -> &[SensorRule] {
        &self.rules
    }

    /// Get a rule by its ID.
    pub fn get_rule(&self, id: &str) -> Option<&SensorRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// The most recent accepted reading for a (plant, parameter) key.
    pub fn latest(&self, plant_id: &str, parameter: Parameter) -> Option<&Measurement> {
        self.latest.get(&(plant_id.to_string(), parameter))
    }

    /// Episode state for a (rule, plant) pair, if one has been created.
    pub fn state(&self, rule_id: &str, plant_id: &str) -> Option<&EvaluationState> {
        self.states
            .get(&(rule_id.to_string(), plant_id.to_string()))
    }

    /// Replace the rule cache with a freshly loaded set and reconcile
    /// episode states: states for deleted or disabled rules are discarded,
    /// and a rule whose `updated_at` changed has its episodes reset (a
    /// changed threshold invalidates a running timer). Untouched rules
    /// keep their episodes, so a refresh never interrupts a healthy one.
    pub fn replace_rules(&mut self, rules: Vec<SensorRule>) {
        let prev_updated: HashMap<String, DateTime<Utc>> = self
            .rules
            .iter()
            .map(|r| (r.id.clone(), r.updated_at))
            .collect();
        let next_updated: HashMap<&str, DateTime<Utc>> = rules
            .iter()
            .filter(|r| r.enabled)
            .map(|r| (r.id.as_str(), r.updated_at))
            .collect();

        self.states.retain(|(rule_id, _), _| {
            match (
                next_updated.get(rule_id.as_str()),
                prev_updated.get(rule_id.as_str()),
            ) {
                (Some(next), Some(prev)) => next == prev,
                _ => false,
            }
        });
        self.rules = rules;
    }

    /// Evaluate one measurement against the rule cache.
    ///
    /// Rejects measurements older than the last accepted one for their
    /// (plant, parameter) key; otherwise updates the latest-reading table,
    /// advances every in-scope rule's episode state, and returns the rules
    /// that fired.
    pub fn ingest(&mut self, measurement: &Measurement) -> Result<Vec<Trigger>, EngineError> {
        let latest_key = (measurement.plant_id.clone(), measurement.parameter);
        if let Some(last) = self.latest.get(&latest_key) {
            if measurement.timestamp < last.timestamp {
                return Err(EngineError::StaleMeasurement {
                    plant_id: measurement.plant_id.clone(),
                    parameter: measurement.parameter,
                    timestamp: measurement.timestamp,
                    last_seen: last.timestamp,
                });
            }
        }
        self.latest.insert(latest_key, measurement.clone());

        let mut triggers = Vec::new();
        for rule in &self.rules {
            if !evaluator::applies(rule, measurement) {
                continue;
            }

            let holds = evaluator::holds(rule, measurement);
            let key = (rule.id.clone(), measurement.plant_id.clone());
            let state = self.states.entry(key).or_default();

            if state.observe(holds, measurement.timestamp, rule.duration_minutes) {
                tracing::debug!(
                    rule_id = %rule.id,
                    plant_id = %measurement.plant_id,
                    value = measurement.value,
                    threshold = rule.threshold,
                    "Rule fired"
                );
                triggers.push(Trigger {
                    rule: rule.clone(),
                    event: make_event(rule, measurement),
                });
            }
        }

        Ok(triggers)
    }
}

fn make_event(rule: &SensorRule, measurement: &Measurement) -> TriggerEvent {
    let message = if rule.duration_minutes == 0 {
        format!(
            "{} is {} {:.1} on {}",
            rule.parameter,
            rule.condition.describe(),
            rule.threshold,
            measurement.plant_id,
        )
    } else {
        format!(
            "{} has been {} {:.1} for {} min on {}",
            rule.parameter,
            rule.condition.describe(),
            rule.threshold,
            rule.duration_minutes,
            measurement.plant_id,
        )
    };

    TriggerEvent {
        id: verdant_common::id::next_id(),
        rule_id: rule.id.clone(),
        plant_id: measurement.plant_id.clone(),
        parameter: rule.parameter,
        condition: rule.condition,
        value: measurement.value,
        threshold: rule.threshold,
        message,
        triggered_at: measurement.timestamp,
    }
}
