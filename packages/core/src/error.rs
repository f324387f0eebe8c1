//! Error taxonomy shared by every layer.

use thiserror::Error;

/// Errors surfaced to callers of the screening service.
#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Scoring failed: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Queue for job {0} is full")]
    QueueFull(crate::JobId),

    #[error("Service is shutting down")]
    ShuttingDown,
}

impl ScreeningError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        ScreeningError::NotFound(what.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ScreeningError::Validation(message.into())
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScreeningError::Persistence(_) | ScreeningError::QueueFull(_)
        )
    }
}

/// Failures of the external collaborators used during one unit of work.
#[derive(Debug, Clone, Error)]
pub enum ScoringError {
    #[error("Scorer transport error: {0}")]
    Transport(String),

    #[error("Scorer timed out after {0}s")]
    Timeout(u64),

    #[error("Resume extraction failed: {0}")]
    Extraction(String),

    #[error("Scorer rejected the request: {0}")]
    Rejected(String),
}

impl ScoringError {
    /// Transport errors and timeouts are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScoringError::Transport(_) | ScoringError::Timeout(_))
    }
}

/// Result alias for service operations.
pub type ScreeningResult<T> = Result<T, ScreeningError>;
