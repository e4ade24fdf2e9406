use serde::Deserialize;
use tracing;
use verdant_common::types::{ChannelKind, ChannelOutcome, DispatchResult, SensorRule, TriggerEvent};

use crate::channels::push::{PushChannel, PushGatewayConfig};
use crate::channels::slack::{SlackChannel, SlackGatewayConfig};
use crate::channels::sms::{SmsChannel, SmsGatewayConfig};
use crate::NotificationChannel;

/// Gateway configuration for the built-in channels. An absent section means
/// that channel is unavailable; rules that enable it get a failed outcome
/// rather than an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub push: Option<PushGatewayConfig>,
    #[serde(default)]
    pub sms: Option<SmsGatewayConfig>,
    #[serde(default)]
    pub slack: Option<SlackGatewayConfig>,
}

impl DispatcherConfig {
    pub fn build_channels(&self) -> Vec<Box<dyn NotificationChannel>> {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
        if let Some(push) = &self.push {
            channels.push(Box::new(PushChannel::new(&push.endpoint_url, &push.api_key)));
        }
        if let Some(sms) = &self.sms {
            channels.push(Box::new(SmsChannel::new(
                &sms.gateway_url,
                &sms.api_key,
                sms.phone_numbers.clone(),
            )));
        }
        if let Some(slack) = &self.slack {
            channels.push(Box::new(SlackChannel::new(&slack.webhook_url)));
        }
        channels
    }
}

/// Fans a trigger out to every channel its rule enables.
///
/// Channels are attempted independently: a failure in one is recorded in
/// its [`ChannelOutcome`] and never blocks the siblings. At-most-one
/// dispatch per episode is enforced upstream by the evaluation engine and
/// is not re-checked here.
pub struct Dispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn from_config(config: &DispatcherConfig) -> Self {
        Self::new(config.build_channels())
    }

    fn enabled_kinds(rule: &SensorRule) -> Vec<ChannelKind> {
        let mut kinds = Vec::new();
        if rule.actions.notification {
            kinds.push(ChannelKind::Notification);
        }
        if rule.actions.sms {
            kinds.push(ChannelKind::Sms);
        }
        if rule.actions.slack.is_enabled() {
            kinds.push(ChannelKind::Slack);
        }
        kinds
    }

    fn channel_for(&self, kind: ChannelKind) -> Option<&dyn NotificationChannel> {
        self.channels
            .iter()
            .find(|c| c.kind() == kind)
            .map(|c| c.as_ref())
    }

    /// Attempt delivery on every channel the rule enables and report one
    /// outcome per channel.
    pub async fn dispatch(&self, rule: &SensorRule, event: &TriggerEvent) -> DispatchResult {
        let mut outcomes = Vec::new();

        for kind in Self::enabled_kinds(rule) {
            let outcome = match self.channel_for(kind) {
                None => ChannelOutcome {
                    channel: kind,
                    delivered: false,
                    error: Some("channel not configured".to_string()),
                },
                Some(channel) => match channel.send(rule, event).await {
                    Ok(()) => ChannelOutcome {
                        channel: kind,
                        delivered: true,
                        error: None,
                    },
                    Err(e) => {
                        tracing::error!(
                            channel = %kind,
                            rule_id = %event.rule_id,
                            error = %e,
                            "Failed to deliver trigger"
                        );
                        ChannelOutcome {
                            channel: kind,
                            delivered: false,
                            error: Some(e.to_string()),
                        }
                    }
                },
            };
            outcomes.push(outcome);
        }

        DispatchResult {
            rule_id: event.rule_id.clone(),
            plant_id: event.plant_id.clone(),
            triggered_at: event.triggered_at,
            outcomes,
        }
    }
}
