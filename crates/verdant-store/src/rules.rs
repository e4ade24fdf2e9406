use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use verdant_common::types::{Condition, Parameter, RuleActions, SensorRule};

use crate::backend::{EqFilter, OrderBy, TableBackend};
use crate::error::{Result, StoreError, ValidationError};
use crate::Capabilities;

pub(crate) const RULES_TABLE: &str = "sensor_rules";

/// Input for creating a rule. Parameter and condition arrive as strings from
/// the app layer and are parsed during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSensorRule {
    pub plant_id: Option<String>,
    pub parameter: String,
    pub condition: String,
    pub threshold: f64,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub actions: RuleActions,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Partial update for an existing rule. `plant_id` uses the double-`Option`
/// convention: outer `None` leaves the scope untouched, `Some(None)` clears
/// it back to all-plants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorRuleUpdate {
    pub plant_id: Option<Option<String>>,
    pub parameter: Option<String>,
    pub condition: Option<String>,
    pub threshold: Option<f64>,
    pub duration_minutes: Option<u32>,
    pub actions: Option<RuleActions>,
    pub enabled: Option<bool>,
}

fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() {
        return Err(ValidationError::NonFiniteThreshold(threshold).into());
    }
    Ok(())
}

fn validate_actions(actions: &RuleActions) -> Result<()> {
    if let Some(cfg) = actions.slack.config() {
        if cfg.channel.trim().is_empty() {
            return Err(ValidationError::EmptySlackChannel.into());
        }
    }
    Ok(())
}

fn parse_parameter(s: &str) -> Result<Parameter> {
    s.parse()
        .map_err(|_| ValidationError::UnknownParameter(s.to_string()).into())
}

fn parse_condition(s: &str) -> Result<Condition> {
    s.parse()
        .map_err(|_| ValidationError::UnknownCondition(s.to_string()).into())
}

/// CRUD persistence for rule definitions, scoped to one authenticated user.
///
/// Write paths are gated by the session's [`Capabilities`]; every operation
/// filters on `user_id` so rules are never visible across users. `create` is
/// not idempotent: repeated calls create duplicate rules.
pub struct RuleStore {
    backend: Arc<dyn TableBackend>,
    user_id: String,
    capabilities: Capabilities,
}

impl RuleStore {
    pub fn new(backend: Arc<dyn TableBackend>, user_id: &str, capabilities: Capabilities) -> Self {
        Self {
            backend,
            user_id: user_id.to_string(),
            capabilities,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Underlying backend reference (used by sibling store modules).
    pub(crate) fn backend(&self) -> &dyn TableBackend {
        self.backend.as_ref()
    }

    fn decode(row: Value) -> Result<SensorRule> {
        Ok(serde_json::from_value(row)?)
    }

    /// List the user's rules, newest first. With `plant_id`, returns rules
    /// scoped to that plant plus global rules (which apply to every plant).
    pub async fn list(&self, plant_id: Option<&str>) -> Result<Vec<SensorRule>> {
        let filters = [EqFilter::new("user_id", self.user_id.as_str())];
        let rows = self
            .backend
            .select(RULES_TABLE, &filters, Some(&OrderBy::desc("created_at")))
            .await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            rules.push(Self::decode(row)?);
        }
        if let Some(plant_id) = plant_id {
            rules.retain(|r| r.matches_plant(plant_id));
        }
        Ok(rules)
    }

    pub async fn get(&self, id: &str) -> Result<SensorRule> {
        let filters = [
            EqFilter::new("id", id),
            EqFilter::new("user_id", self.user_id.as_str()),
        ];
        let mut rows = self.backend.select(RULES_TABLE, &filters, None).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound {
                entity: "sensor_rule",
                id: id.to_string(),
            });
        }
        Self::decode(rows.remove(0))
    }

    pub async fn create(&self, input: CreateSensorRule) -> Result<SensorRule> {
        if !self.capabilities.can_create {
            return Err(StoreError::PermissionDenied { action: "create" });
        }

        let parameter = parse_parameter(&input.parameter)?;
        let condition = parse_condition(&input.condition)?;
        validate_threshold(input.threshold)?;
        validate_actions(&input.actions)?;

        let now = Utc::now();
        let rule = SensorRule {
            id: verdant_common::id::next_id(),
            user_id: self.user_id.clone(),
            plant_id: input.plant_id,
            parameter,
            condition,
            threshold: input.threshold,
            duration_minutes: input.duration_minutes,
            actions: input.actions,
            enabled: input.enabled,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .backend
            .insert(RULES_TABLE, serde_json::to_value(&rule)?)
            .await?;
        tracing::debug!(rule_id = %rule.id, user_id = %self.user_id, "Sensor rule created");
        Self::decode(stored)
    }

    pub async fn update(&self, id: &str, patch: SensorRuleUpdate) -> Result<SensorRule> {
        if !self.capabilities.can_edit {
            return Err(StoreError::PermissionDenied { action: "update" });
        }

        // Ownership check; also gives us the base to merge the patch into.
        let mut rule = self.get(id).await?;

        if let Some(plant_id) = patch.plant_id {
            rule.plant_id = plant_id;
        }
        if let Some(parameter) = patch.parameter.as_deref() {
            rule.parameter = parse_parameter(parameter)?;
        }
        if let Some(condition) = patch.condition.as_deref() {
            rule.condition = parse_condition(condition)?;
        }
        if let Some(threshold) = patch.threshold {
            validate_threshold(threshold)?;
            rule.threshold = threshold;
        }
        if let Some(duration_minutes) = patch.duration_minutes {
            rule.duration_minutes = duration_minutes;
        }
        if let Some(actions) = patch.actions {
            validate_actions(&actions)?;
            rule.actions = actions;
        }
        if let Some(enabled) = patch.enabled {
            rule.enabled = enabled;
        }
        rule.updated_at = Utc::now();

        let stored = self
            .backend
            .update(RULES_TABLE, id, serde_json::to_value(&rule)?)
            .await?;
        Self::decode(stored)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.capabilities.can_delete {
            return Err(StoreError::PermissionDenied { action: "delete" });
        }

        // Ownership check before touching the backend row.
        self.get(id).await?;
        self.backend.delete(RULES_TABLE, id).await?;
        tracing::debug!(rule_id = %id, user_id = %self.user_id, "Sensor rule deleted");
        Ok(())
    }
}
