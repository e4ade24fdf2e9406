use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing;
use verdant_common::types::{ChannelKind, SensorRule, TriggerEvent};

/// Upper bound on one delivery attempt per recipient.
const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// SMS channel: delivers a short text rendering of the trigger to the
/// user's configured phone numbers through the SMS gateway.
pub struct SmsChannel {
    client: reqwest::Client,
    gateway_url: String,
    api_key: String,
    phone_numbers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsGatewayConfig {
    pub gateway_url: String,
    pub api_key: String,
    pub phone_numbers: Vec<String>,
}

impl SmsChannel {
    pub fn new(gateway_url: &str, api_key: &str, phone_numbers: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url: gateway_url.to_string(),
            api_key: api_key.to_string(),
            phone_numbers,
        }
    }

    fn format_message(event: &TriggerEvent) -> String {
        format!(
            "[verdant] {plant}: {message}",
            plant = event.plant_id,
            message = event.message,
        )
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    async fn send(&self, _rule: &SensorRule, event: &TriggerEvent) -> Result<()> {
        let message = Self::format_message(event);
        let mut failed: Vec<String> = Vec::new();

        for phone in &self.phone_numbers {
            let payload = serde_json::json!({
                "to": phone,
                "body": message,
            });

            let mut last_err = None;
            for attempt in 0..3u32 {
                match self
                    .client
                    .post(&self.gateway_url)
                    .timeout(SEND_TIMEOUT)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&payload)
                    .send()
                    .await
                {
                    Ok(resp) if resp.status().is_success() => {
                        last_err = None;
                        break;
                    }
                    Ok(resp) => {
                        let status = resp.status();
                        tracing::warn!(
                            attempt = attempt + 1,
                            phone = %phone,
                            status = %status,
                            "SMS gateway returned error, retrying"
                        );
                        last_err = Some(anyhow::anyhow!("HTTP {status}"));
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt = attempt + 1,
                            phone = %phone,
                            error = %e,
                            "SMS send failed, retrying"
                        );
                        last_err = Some(e.into());
                    }
                }
                if attempt < 2 {
                    tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt)))
                        .await;
                }
            }

            if let Some(e) = last_err {
                tracing::error!(phone = %phone, error = %e, "SMS failed after 3 retries");
                failed.push(phone.clone());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "SMS delivery failed for {}",
                failed.join(", ")
            ))
        }
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }
}
