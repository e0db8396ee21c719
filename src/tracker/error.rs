//! Failure taxonomy for tracker operations.

use thiserror::Error;

use super::store::StoreError;

pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// Malformed or missing input; correct it rather than retry.
    #[error("{0}")]
    Validation(String),

    /// The caller is not the owner, or a subtask is linked to another task.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// The transaction aborted cleanly; retrying the whole operation is safe.
    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for TrackerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TaskNotFound(id) => Self::NotFound(format!("task not found: {id}")),
            StoreError::SubtaskNotFound(id) => {
                Self::NotFound(format!("subtask not found: {id}"))
            }
            StoreError::Persistence(_) => Self::Storage(err),
        }
    }
}
