//! Sensor rule evaluation engine.
//!
//! The engine consumes timestamped measurements, evaluates them against the
//! user's threshold rules, and tracks how long each rule's condition has
//! held per plant. When a condition has held for a rule's configured
//! duration, the rule fires once for that episode and its actions are
//! handed to the notification dispatcher. [`runtime::EngineRuntime`] owns
//! the lifecycle: it keeps the rule cache fresh from the store on a fixed
//! interval and fans triggers out without blocking ingestion.

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod runtime;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use engine::{RuleEngine, Trigger};
pub use error::EngineError;
pub use runtime::{EngineHealth, EngineRuntime, EngineState};
