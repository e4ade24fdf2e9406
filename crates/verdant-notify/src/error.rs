/// Errors that can occur within the notification subsystem.
///
/// The [`crate::NotificationChannel`] trait returns `anyhow::Result` at the
/// seam; channel internals use this type so failures carry the service and
/// status they came from.
///
/// # Examples
///
/// ```rust
/// use verdant_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing webhook_url".to_string());
/// assert!(err.to_string().contains("webhook_url"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an
    /// invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// An HTTP request to an external delivery endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The external API returned a non-success response.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    ApiError {
        service: String,
        status: u16,
        body: String,
    },

    /// Generic notification error for cases not covered by other variants.
    #[error("Notify: {0}")]
    Other(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
