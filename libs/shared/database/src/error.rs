use shared_models::error::AppError;
use thiserror::Error;

/// Failure reported by a persistence backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The write was rejected by a uniqueness or exclusion constraint.
    #[error("Write rejected by store constraint: {0}")]
    Conflict(String),

    #[error("Record rejected by store validation: {0}")]
    Invalid(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store request failed: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Invalid(msg) => AppError::ValidationError(msg),
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Backend(msg) => AppError::Database(msg),
        }
    }
}
