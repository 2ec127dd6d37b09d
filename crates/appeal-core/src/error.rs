use std::time::Duration;

use thiserror::Error;

use crate::types::Stage;

/// Failure reported by a generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("generation service unavailable: {0}")]
    Unavailable(String),
    #[error("generation quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("generation call timed out after {0:?}")]
    Timeout(Duration),
}

impl ServiceError {
    /// Quota errors are final; everything else may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::QuotaExceeded(_))
    }
}

/// Caller-facing errors from the workflow. None of these leave partial state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppealError {
    #[error("missing required case fields: {}", missing.join(", "))]
    InvalidInput { missing: Vec<String> },
    #[error("cannot {action} while run is {stage}")]
    InvalidStage { action: &'static str, stage: Stage },
    #[error("unknown appeal angle: {0}")]
    UnknownAngle(String),
    #[error("unknown situation flag: {0}")]
    UnknownFlag(String),
}

pub type Result<T, E = AppealError> = std::result::Result<T, E>;
