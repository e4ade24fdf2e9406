/// Errors produced while validating a rule definition.
///
/// Validation runs before any backend call: a rule that fails here is
/// rejected without touching the store.
///
/// # Examples
///
/// ```rust
/// use verdant_store::error::ValidationError;
///
/// let err = ValidationError::UnknownParameter("humidity".to_string());
/// assert!(err.to_string().contains("humidity"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The parameter string is not one of the recognized sensor parameters.
    #[error("Validation: unknown sensor parameter '{0}'")]
    UnknownParameter(String),

    /// The condition string is not one of the recognized comparison operators.
    #[error("Validation: unknown condition operator '{0}'")]
    UnknownCondition(String),

    /// The threshold is NaN or infinite.
    #[error("Validation: threshold must be a finite number, got {0}")]
    NonFiniteThreshold(f64),

    /// The Slack action is enabled but names no channel.
    #[error("Validation: slack action enabled without a channel")]
    EmptySlackChannel,
}

/// Errors that can occur within the rule store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The rule definition was rejected before persistence.
    #[error("Store: {0}")]
    Validation(#[from] ValidationError),

    /// A required record was not found (or is not owned by this user).
    #[error("Store: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The session's capability set does not permit this write.
    #[error("Store: permission denied for {action}")]
    PermissionDenied { action: &'static str },

    /// An HTTP request to the backend service failed.
    #[error("Store: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend service returned a non-success response.
    #[error("Store: backend error: status={status}, body={body}")]
    Backend { status: u16, body: String },

    /// JSON serialization or deserialization failed.
    #[error("Store: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic store error for cases not covered by other variants.
    #[error("Store: {0}")]
    Other(String),
}

/// Convenience `Result` alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
