use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid schedule entry: {0}")]
    InvalidEntry(String),

    /// `existing` is unknown when the backend constraint caught the overlap.
    #[error("Schedule entry overlaps an existing entry")]
    ScheduleOverlap { existing: Option<Uuid> },

    #[error("Directory backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for DirectoryError {
    fn from(err: anyhow::Error) -> Self {
        DirectoryError::Backend(err.to_string())
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            DirectoryError::InvalidEntry(msg) => AppError::ValidationError(msg),
            e @ DirectoryError::ScheduleOverlap { .. } => AppError::Conflict(e.to_string()),
            DirectoryError::Backend(msg) => AppError::ExternalService(msg),
        }
    }
}
