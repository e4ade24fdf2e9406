use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing;
use verdant_common::types::{Measurement, RawMeasurement};
use verdant_notify::dispatcher::Dispatcher;
use verdant_store::RuleStore;

use crate::config::EngineConfig;
use crate::engine::{RuleEngine, Trigger};
use crate::error::{EngineError, Result};

/// Explicit engine lifecycle state. Transitions happen only in `start()`
/// and `stop()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

/// Health signal for the hosting application. A growing failure count
/// means the engine is evaluating against a stale rule set.
#[derive(Debug, Clone, Default)]
pub struct EngineHealth {
    pub rules_loaded: usize,
    pub consecutive_refresh_failures: u32,
    pub last_refresh_at: Option<DateTime<Utc>>,
}

struct Lifecycle {
    state: EngineState,
    refresh_task: Option<JoinHandle<()>>,
}

/// Owns the evaluation engine's lifecycle: rule cache refresh on a fixed
/// interval, measurement intake, and fire-and-forget dispatch of triggers.
///
/// `stop()` halts intake and refresh but leaves episode state intact, so a
/// later `start()` resumes where it left off. In-flight dispatches are
/// allowed to complete.
pub struct EngineRuntime {
    store: Arc<RuleStore>,
    dispatcher: Arc<Dispatcher>,
    engine: Arc<Mutex<RuleEngine>>,
    health: Arc<Mutex<EngineHealth>>,
    lifecycle: Mutex<Lifecycle>,
    refresh_interval: std::time::Duration,
}

impl EngineRuntime {
    pub fn new(store: Arc<RuleStore>, dispatcher: Arc<Dispatcher>, config: &EngineConfig) -> Self {
        Self {
            store,
            dispatcher,
            engine: Arc::new(Mutex::new(RuleEngine::new(Vec::new()))),
            health: Arc::new(Mutex::new(EngineHealth::default())),
            lifecycle: Mutex::new(Lifecycle {
                state: EngineState::Stopped,
                refresh_task: None,
            }),
            refresh_interval: config.refresh_interval(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .state
    }

    pub fn health(&self) -> EngineHealth {
        self.health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Load the rule cache and begin the refresh loop.
    ///
    /// An initial load failure is not fatal: the engine starts with an
    /// empty rule set, surfaces the failure through [`EngineHealth`], and
    /// the loop keeps retrying on its interval.
    pub async fn start(&self) -> Result<()> {
        {
            let mut lifecycle = self
                .lifecycle
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if lifecycle.state == EngineState::Running {
                return Err(EngineError::AlreadyRunning);
            }
            lifecycle.state = EngineState::Running;
        }

        Self::refresh(&self.store, &self.engine, &self.health).await;

        let store = self.store.clone();
        let engine = self.engine.clone();
        let health = self.health.clone();
        let interval = self.refresh_interval;
        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            // Skip, never overlap: a cycle slower than the interval costs
            // the next tick rather than stacking refreshes.
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; the initial load
            // already happened in start().
            tick.tick().await;
            loop {
                tick.tick().await;
                Self::refresh(&store, &engine, &health).await;
            }
        });

        let mut lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        lifecycle.refresh_task = Some(task);
        tracing::info!(
            refresh_interval_ms = self.refresh_interval.as_millis() as u64,
            "Rule engine started"
        );
        Ok(())
    }

    /// Halt measurement intake and the refresh loop. Episode state stays in
    /// memory, so the runtime is resumable.
    pub fn stop(&self) -> Result<()> {
        let mut lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if lifecycle.state == EngineState::Stopped {
            return Err(EngineError::Stopped);
        }
        if let Some(task) = lifecycle.refresh_task.take() {
            task.abort();
        }
        lifecycle.state = EngineState::Stopped;
        tracing::info!("Rule engine stopped");
        Ok(())
    }

    async fn refresh(
        store: &Arc<RuleStore>,
        engine: &Arc<Mutex<RuleEngine>>,
        health: &Arc<Mutex<EngineHealth>>,
    ) {
        match store.list(None).await {
            Ok(rules) => {
                let count = rules.len();
                engine
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .replace_rules(rules);
                let mut health = health
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                health.rules_loaded = count;
                health.consecutive_refresh_failures = 0;
                health.last_refresh_at = Some(Utc::now());
                tracing::debug!(rule_count = count, "Rule cache refreshed");
            }
            Err(e) => {
                let mut health = health
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                health.consecutive_refresh_failures += 1;
                tracing::error!(
                    error = %e,
                    failures = health.consecutive_refresh_failures,
                    "Rule refresh failed; keeping last-known-good rule set"
                );
            }
        }
    }

    /// Ingest one measurement: evaluate it synchronously, then hand any
    /// triggers to the dispatcher without waiting for delivery.
    pub fn ingest(&self, measurement: &Measurement) -> Result<()> {
        if self.state() != EngineState::Running {
            return Err(EngineError::Stopped);
        }

        let triggers = self
            .engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .ingest(measurement)
            .map_err(|e| {
                if matches!(e, EngineError::StaleMeasurement { .. }) {
                    // Reject-and-log policy: stale readings are dropped to
                    // keep duration accounting monotonic.
                    tracing::warn!(
                        plant_id = %measurement.plant_id,
                        parameter = %measurement.parameter,
                        error = %e,
                        "Dropping stale measurement"
                    );
                }
                e
            })?;

        for trigger in triggers {
            self.spawn_dispatch(trigger);
        }
        Ok(())
    }

    /// Ingest a small batch, returning one result per measurement. A stale
    /// measurement rejects only itself; the rest of the batch proceeds.
    pub fn ingest_batch(&self, measurements: &[Measurement]) -> Vec<Result<()>> {
        measurements.iter().map(|m| self.ingest(m)).collect()
    }

    /// Ingest a reading from the telemetry collaborator, checking its
    /// parameter against the recognized set first.
    pub fn ingest_raw(&self, raw: RawMeasurement) -> Result<()> {
        let parameter = raw.parameter.clone();
        let measurement = raw
            .parse()
            .map_err(|_| EngineError::UnknownParameter(parameter))?;
        self.ingest(&measurement)
    }

    fn spawn_dispatch(&self, trigger: Trigger) {
        let dispatcher = self.dispatcher.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            let Trigger { rule, event } = trigger;
            let result = dispatcher.dispatch(&rule, &event).await;
            if !result.all_delivered() {
                tracing::warn!(
                    rule_id = %event.rule_id,
                    plant_id = %event.plant_id,
                    "One or more channels failed for trigger"
                );
            }
            if let Err(e) = store.log_dispatch(&event, &result).await {
                tracing::warn!(
                    rule_id = %event.rule_id,
                    error = %e,
                    "Failed to record dispatch log"
                );
            }
        });
    }
}
