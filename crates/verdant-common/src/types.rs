use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A measured sensor quantity.
///
/// # Examples
///
/// ```
/// use verdant_common::types::Parameter;
///
/// let p: Parameter = "water_level".parse().unwrap();
/// assert_eq!(p, Parameter::WaterLevel);
/// assert_eq!(p.to_string(), "water_level");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Ph,
    Ec,
    Temperature,
    Nitrogen,
    Phosphorus,
    Potassium,
    WaterLevel,
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parameter::Ph => write!(f, "ph"),
            Parameter::Ec => write!(f, "ec"),
            Parameter::Temperature => write!(f, "temperature"),
            Parameter::Nitrogen => write!(f, "nitrogen"),
            Parameter::Phosphorus => write!(f, "phosphorus"),
            Parameter::Potassium => write!(f, "potassium"),
            Parameter::WaterLevel => write!(f, "water_level"),
        }
    }
}

impl std::str::FromStr for Parameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ph" => Ok(Parameter::Ph),
            "ec" => Ok(Parameter::Ec),
            "temperature" => Ok(Parameter::Temperature),
            "nitrogen" => Ok(Parameter::Nitrogen),
            "phosphorus" => Ok(Parameter::Phosphorus),
            "potassium" => Ok(Parameter::Potassium),
            "water_level" => Ok(Parameter::WaterLevel),
            _ => Err(format!("unknown sensor parameter: {s}")),
        }
    }
}

/// Comparison operator applied between a reading and a rule threshold.
///
/// # Examples
///
/// ```
/// use verdant_common::types::Condition;
///
/// let cond: Condition = "<".parse().unwrap();
/// assert!(cond.check(5.0, 5.5));
/// assert!(!cond.check(6.0, 5.5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterEqual,
}

impl Condition {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Condition::LessThan => value < threshold,
            Condition::LessEqual => value <= threshold,
            Condition::GreaterThan => value > threshold,
            Condition::GreaterEqual => value >= threshold,
        }
    }

    /// Human-readable form used in trigger messages (e.g., "below").
    pub fn describe(&self) -> &'static str {
        match self {
            Condition::LessThan => "below",
            Condition::LessEqual => "at or below",
            Condition::GreaterThan => "above",
            Condition::GreaterEqual => "at or above",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::LessThan => write!(f, "<"),
            Condition::LessEqual => write!(f, "<="),
            Condition::GreaterThan => write!(f, ">"),
            Condition::GreaterEqual => write!(f, ">="),
        }
    }
}

impl std::str::FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" | "lt" | "less_than" => Ok(Condition::LessThan),
            "<=" | "lte" | "less_equal" => Ok(Condition::LessEqual),
            ">" | "gt" | "greater_than" => Ok(Condition::GreaterThan),
            ">=" | "gte" | "greater_equal" => Ok(Condition::GreaterEqual),
            _ => Err(format!("unknown condition operator: {s}")),
        }
    }
}

/// Slack delivery settings for a rule that routes to a Slack channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackConfig {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention_user_id: Option<String>,
}

/// Slack action setting: either disabled or enabled with a target channel.
///
/// Serialized as a nullable object so that stored rules keep the backend's
/// wire shape (`null` = disabled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<SlackConfig>", into = "Option<SlackConfig>")]
pub enum SlackAction {
    Disabled,
    Enabled(SlackConfig),
}

impl SlackAction {
    pub fn is_enabled(&self) -> bool {
        matches!(self, SlackAction::Enabled(_))
    }

    pub fn config(&self) -> Option<&SlackConfig> {
        match self {
            SlackAction::Disabled => None,
            SlackAction::Enabled(cfg) => Some(cfg),
        }
    }
}

impl From<Option<SlackConfig>> for SlackAction {
    fn from(opt: Option<SlackConfig>) -> Self {
        match opt {
            None => SlackAction::Disabled,
            Some(cfg) => SlackAction::Enabled(cfg),
        }
    }
}

impl From<SlackAction> for Option<SlackConfig> {
    fn from(action: SlackAction) -> Self {
        match action {
            SlackAction::Disabled => None,
            SlackAction::Enabled(cfg) => Some(cfg),
        }
    }
}

impl Default for SlackAction {
    fn default() -> Self {
        SlackAction::Disabled
    }
}

/// Independently enabled delivery channels for a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleActions {
    #[serde(default)]
    pub notification: bool,
    #[serde(default)]
    pub sms: bool,
    #[serde(default)]
    pub slack: SlackAction,
}

/// A persisted threshold rule on a sensor parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorRule {
    pub id: String,
    pub user_id: String,
    /// `None` applies the rule to every plant the user owns.
    pub plant_id: Option<String>,
    pub parameter: Parameter,
    pub condition: Condition,
    pub threshold: f64,
    /// Minimum continuous minutes the condition must hold before firing.
    /// 0 fires on the first true reading.
    pub duration_minutes: u32,
    pub actions: RuleActions,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SensorRule {
    /// Whether this rule is in scope for a measurement from `plant_id`.
    pub fn matches_plant(&self, plant_id: &str) -> bool {
        match &self.plant_id {
            None => true,
            Some(scoped) => scoped == plant_id,
        }
    }
}

/// A timestamped sensor reading for one plant and parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub plant_id: String,
    pub parameter: Parameter,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// A reading as delivered by the telemetry collaborator, before the
/// parameter string has been checked against the recognized set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub plant_id: String,
    pub parameter: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl RawMeasurement {
    /// Structural validation: the parameter must be a recognized enum value.
    /// Out-of-range values pass through untouched.
    pub fn parse(self) -> Result<Measurement, String> {
        let parameter: Parameter = self.parameter.parse()?;
        Ok(Measurement {
            plant_id: self.plant_id,
            parameter,
            value: self.value,
            timestamp: self.timestamp,
        })
    }
}

/// Produced when a rule's condition has held for its configured duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub id: String,
    pub rule_id: String,
    pub plant_id: String,
    pub parameter: Parameter,
    pub condition: Condition,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

/// A delivery mechanism for a triggered rule's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Notification,
    Sms,
    Slack,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Notification => write!(f, "notification"),
            ChannelKind::Sms => write!(f, "sms"),
            ChannelKind::Slack => write!(f, "slack"),
        }
    }
}

/// Delivery outcome for one channel of a dispatched trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: ChannelKind,
    pub delivered: bool,
    pub error: Option<String>,
}

/// Per-channel outcomes of dispatching one trigger. A failed channel never
/// aborts its siblings; every attempted channel is reported here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub rule_id: String,
    pub plant_id: String,
    pub triggered_at: DateTime<Utc>,
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchResult {
    pub fn all_delivered(&self) -> bool {
        self.outcomes.iter().all(|o| o.delivered)
    }
}
