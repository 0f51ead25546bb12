use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for queue operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Bad input shape: topic, payload, job id, error message or duration
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Underlying persistence failure
    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Check if this error originated in the backend rather than the caller
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Job handler outcome - determines how the worker resolves the lease
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Retryable error - job stays leasable once its block window elapses
    #[error("Retryable error: {0}")]
    Retryable(String),

    /// Permanent error - job is marked done and never leased again
    #[error("Permanent error: {0}")]
    Permanent(String),
}

impl JobError {
    /// Create a retryable error
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    /// Create a permanent error
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(msg) | Self::Permanent(msg) => msg,
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(format!("payload encoding: {}", err))
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}
