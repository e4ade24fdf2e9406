use chrono::{DateTime, Utc};
use verdant_common::types::Parameter;

/// Errors that can occur within the evaluation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A measurement arrived with a timestamp earlier than the last one
    /// accepted for its (plant, parameter) key. Rejected to keep duration
    /// accounting monotonic; non-fatal for the engine.
    #[error(
        "Engine: stale measurement for ({plant_id}, {parameter}): \
         {timestamp} is earlier than last seen {last_seen}"
    )]
    StaleMeasurement {
        plant_id: String,
        parameter: Parameter,
        timestamp: DateTime<Utc>,
        last_seen: DateTime<Utc>,
    },

    /// A raw measurement named a parameter outside the recognized set.
    #[error("Engine: unknown sensor parameter '{0}'")]
    UnknownParameter(String),

    /// The runtime is stopped and not accepting measurements.
    #[error("Engine: not running")]
    Stopped,

    /// `start()` was called while the runtime is already running.
    #[error("Engine: already running")]
    AlreadyRunning,

    /// A store operation failed.
    #[error("Engine: {0}")]
    Store(#[from] verdant_store::error::StoreError),
}

/// Convenience `Result` alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
