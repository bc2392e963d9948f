use thiserror::Error;

use crate::db::QuotaStatus;

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("entry {0} not found")]
    EntryNotFound(String),

    #[error("entry has no photo that can be loaded")]
    MissingPhoto,

    #[error("this photo has already been evaluated")]
    DuplicateEvaluation,

    #[error("monthly AI score limit reached ({}/{} used in {})", .0.used, .0.limit, .0.month_key)]
    QuotaExceeded(QuotaStatus),

    #[error("scoring service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("scoring service returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl EvaluationError {
    /// Transient failures the user may retry as-is. Everything else needs a
    /// change first (a photo, a new photo, or the next month).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EvaluationError::ServiceUnavailable(_)
                | EvaluationError::InvalidResponse(_)
                | EvaluationError::Cancelled
        )
    }
}

impl From<reqwest::Error> for EvaluationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            EvaluationError::InvalidResponse(error.to_string())
        } else {
            EvaluationError::ServiceUnavailable(error.to_string())
        }
    }
}
