use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use verdant_common::types::{DispatchResult, TriggerEvent};

use crate::error::Result;
use crate::rules::RuleStore;

pub(crate) const DISPATCH_LOG_TABLE: &str = "rule_dispatch_log";

/// One delivery attempt row (one channel of one trigger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchLogRow {
    pub id: String,
    pub user_id: String,
    pub rule_id: String,
    pub plant_id: String,
    pub channel: String,
    pub delivered: bool,
    pub error: Option<String>,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RuleStore {
    /// Record the per-channel outcomes of a dispatched trigger.
    ///
    /// The log is an audit trail, not part of the evaluation path; callers
    /// treat failures here as non-fatal.
    pub async fn log_dispatch(&self, event: &TriggerEvent, result: &DispatchResult) -> Result<()> {
        let now = Utc::now();
        for outcome in &result.outcomes {
            let row = DispatchLogRow {
                id: verdant_common::id::next_id(),
                user_id: self.user_id().to_string(),
                rule_id: event.rule_id.clone(),
                plant_id: event.plant_id.clone(),
                channel: outcome.channel.to_string(),
                delivered: outcome.delivered,
                error: outcome.error.clone(),
                message: event.message.clone(),
                triggered_at: event.triggered_at,
                created_at: now,
            };
            self.backend()
                .insert(DISPATCH_LOG_TABLE, serde_json::to_value(&row)?)
                .await?;
        }
        Ok(())
    }

    /// List this user's dispatch log rows, newest first.
    pub async fn list_dispatch_log(&self, rule_id: Option<&str>) -> Result<Vec<DispatchLogRow>> {
        let mut filters = vec![crate::backend::EqFilter::new("user_id", self.user_id())];
        if let Some(rule_id) = rule_id {
            filters.push(crate::backend::EqFilter::new("rule_id", rule_id));
        }
        let rows = self
            .backend()
            .select(
                DISPATCH_LOG_TABLE,
                &filters,
                Some(&crate::backend::OrderBy::desc("created_at")),
            )
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(serde_json::from_value(row)?);
        }
        Ok(out)
    }
}
