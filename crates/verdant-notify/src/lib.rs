//! Notification delivery for triggered sensor rules.
//!
//! A fired rule is handed to the [`dispatcher::Dispatcher`], which fans the
//! trigger out to every channel the rule enables. Built-in channels are
//! push notification, SMS, and Slack; each delivery is attempted
//! independently and reported as its own outcome.

pub mod channels;
pub mod dispatcher;
pub mod error;


use anyhow::Result;
use async_trait::async_trait;
use verdant_common::types::{ChannelKind, SensorRule, TriggerEvent};

/// A delivery channel that sends a triggered rule's action to an external
/// service (push gateway, SMS gateway, Slack webhook).
///
/// Implementations are registered in the [`dispatcher::Dispatcher`], which
/// selects them by [`ChannelKind`] against the rule's enabled actions.
/// Episode-level deduplication happens upstream in the evaluation engine;
/// channels deliver every trigger they are handed.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the trigger through this channel.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after retries (if applicable).
    async fn send(&self, rule: &SensorRule, event: &TriggerEvent) -> Result<()>;

    /// The action kind this channel serves.
    fn kind(&self) -> ChannelKind;
}
