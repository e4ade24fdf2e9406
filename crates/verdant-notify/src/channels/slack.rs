use crate::error::NotifyError;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing;
use verdant_common::types::{ChannelKind, SensorRule, TriggerEvent};

/// Upper bound on one delivery attempt.
const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Slack channel: posts the trigger to the workspace webhook, targeting the
/// channel named in the rule's Slack action. A `mention_user_id` in the
/// action is rendered as a leading `<@id>` mention.
pub struct SlackChannel {
    client: reqwest::Client,
    webhook_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackGatewayConfig {
    pub webhook_url: String,
}

impl SlackChannel {
    pub fn new(webhook_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.to_string(),
        }
    }

    fn format_text(rule: &SensorRule, event: &TriggerEvent) -> String {
        let mention = rule
            .actions
            .slack
            .config()
            .and_then(|cfg| cfg.mention_user_id.as_deref())
            .map(|id| format!("<@{id}> "))
            .unwrap_or_default();
        format!("{mention}{}", event.message)
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    async fn send(&self, rule: &SensorRule, event: &TriggerEvent) -> Result<()> {
        let Some(cfg) = rule.actions.slack.config() else {
            return Err(NotifyError::InvalidConfig(
                "slack action not enabled for this rule".to_string(),
            )
            .into());
        };

        let payload = serde_json::json!({
            "channel": cfg.channel,
            "text": Self::format_text(rule, event),
        });

        let mut last_err = None;
        for attempt in 0..3u32 {
            match self
                .client
                .post(&self.webhook_url)
                .timeout(SEND_TIMEOUT)
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::warn!(
                        attempt = attempt + 1,
                        channel = %cfg.channel,
                        status = %status,
                        "Slack webhook returned error, retrying"
                    );
                    last_err = Some(NotifyError::ApiError {
                        service: "slack".to_string(),
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        channel = %cfg.channel,
                        error = %e,
                        "Slack send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt)))
                    .await;
            }
        }

        Err(last_err
            .unwrap_or_else(|| NotifyError::Other("slack send failed".to_string()))
            .into())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }
}
