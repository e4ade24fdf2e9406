//! Pure condition evaluation. No side effects; the same (rule, measurement)
//! pair always yields the same result.

use verdant_common::types::{Measurement, SensorRule};

/// Whether a rule is in scope for a measurement: the parameter must match
/// and the measurement's plant must be covered by the rule's scope
/// (plant-scoped rules match only their plant, global rules match all).
/// Disabled rules are never in scope.
pub fn applies(rule: &SensorRule, measurement: &Measurement) -> bool {
    rule.enabled
        && rule.parameter == measurement.parameter
        && rule.matches_plant(&measurement.plant_id)
}

/// Whether the measurement satisfies the rule's comparison.
///
/// Only meaningful for measurements the rule [`applies`] to; scope is not
/// re-checked here.
pub fn holds(rule: &SensorRule, measurement: &Measurement) -> bool {
    rule.condition.check(measurement.value, rule.threshold)
}
