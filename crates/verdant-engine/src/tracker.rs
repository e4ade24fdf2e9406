//! Per-(rule, plant) episode tracking.
//!
//! An episode is a maximal continuous interval during which a rule's
//! condition holds for one plant. Each episode fires at most once: when the
//! condition has held for the rule's configured duration. The episode ends
//! only when a false-condition measurement arrives, which resets the state
//! to idle.

use chrono::{DateTime, Duration, Utc};

/// Where a (rule, plant) pair currently sits in its episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Condition not observed true.
    Idle,
    /// Condition true, timer running, elapsed < duration.
    Accumulating,
    /// Fired for this episode; no further dispatch until reset.
    Triggered,
}

/// Mutable episode state for one (rule, plant) pair. Created lazily on the
/// first in-scope measurement and owned exclusively by the engine; never
/// persisted.
#[derive(Debug, Clone)]
pub struct EvaluationState {
    phase: Phase,
    condition_true_since: Option<DateTime<Utc>>,
    last_triggered_at: Option<DateTime<Utc>>,
}

impl EvaluationState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            condition_true_since: None,
            last_triggered_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn condition_true_since(&self) -> Option<DateTime<Utc>> {
        self.condition_true_since
    }

    /// When this pair last fired, across episodes.
    pub fn last_triggered_at(&self) -> Option<DateTime<Utc>> {
        self.last_triggered_at
    }

    /// Feed one observation into the state machine. Returns `true` exactly
    /// when the rule should fire: the first observation of this episode at
    /// which the condition has held for `duration_minutes`.
    pub fn observe(
        &mut self,
        condition_holds: bool,
        at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> bool {
        if !condition_holds {
            // Episode over; the next true reading starts a fresh timer.
            self.phase = Phase::Idle;
            self.condition_true_since = None;
            return false;
        }

        let since = match self.condition_true_since {
            Some(since) => since,
            None => {
                self.phase = Phase::Accumulating;
                self.condition_true_since = Some(at);
                at
            }
        };

        if self.phase == Phase::Triggered {
            // At most one dispatch per continuous true episode.
            return false;
        }

        let required = Duration::minutes(i64::from(duration_minutes));
        if at - since >= required {
            self.phase = Phase::Triggered;
            self.last_triggered_at = Some(at);
            return true;
        }

        self.phase = Phase::Accumulating;
        false
    }
}

impl Default for EvaluationState {
    fn default() -> Self {
        Self::new()
    }
}
