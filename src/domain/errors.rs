use std::time::Duration;

use thiserror::Error;

use crate::domain::models::AttemptId;

/// Errors surfaced to the submitter.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Rate limit exceeded: attempt {attempt_id} was not queued")]
    RateLimitExceeded { attempt_id: AttemptId },
    #[error("Backend {0:?} is registered more than once")]
    DuplicateBackend(String),
    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

/// Reasons a single backend invocation failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("{0}")]
    Rejected(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        BackendError::Rejected(reason.into())
    }
}
