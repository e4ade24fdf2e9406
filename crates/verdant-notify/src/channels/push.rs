use crate::error::NotifyError;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing;
use verdant_common::types::{ChannelKind, SensorRule, TriggerEvent};

/// Upper bound on one delivery attempt; failures surface as outcomes, so a
/// hung gateway must not hold a dispatch task indefinitely.
const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Push notification channel: delivers triggers to the push service, which
/// routes them to the owning user's registered devices.
pub struct PushChannel {
    client: reqwest::Client,
    endpoint_url: String,
    api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushGatewayConfig {
    pub endpoint_url: String,
    pub api_key: String,
}

impl PushChannel {
    pub fn new(endpoint_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint_url: endpoint_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn format_title(event: &TriggerEvent) -> String {
        format!("Plant alert: {}", event.parameter)
    }
}

#[async_trait]
impl NotificationChannel for PushChannel {
    async fn send(&self, rule: &SensorRule, event: &TriggerEvent) -> Result<()> {
        let payload = serde_json::json!({
            "title": Self::format_title(event),
            "body": event.message,
            "target_user_id": rule.user_id,
        });

        let mut last_err = None;
        for attempt in 0..3u32 {
            match self
                .client
                .post(&self.endpoint_url)
                .timeout(SEND_TIMEOUT)
                .header("Authorization", format!("Bearer {}", self.api_key))
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
                        rule_id = %event.rule_id,
                        status = %status,
                        "Push service returned error, retrying"
                    );
                    last_err = Some(NotifyError::ApiError {
                        service: "push".to_string(),
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        rule_id = %event.rule_id,
                        error = %e,
                        "Push send failed, retrying"
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
            .unwrap_or_else(|| NotifyError::Other("push send failed".to_string()))
            .into())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Notification
    }
}
