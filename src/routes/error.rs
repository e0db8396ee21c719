use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{error, info};
use thiserror::Error;

use super::tasks::tasks_models::MessageResponse;
use crate::identity::IdentityError;
use crate::tracker::TrackerError;

const STORAGE_FAILURE_MESSAGE: &str = "Something went wrong, please try again later.";

// Every failure a handler can surface, mapped onto a status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    // Detail is logged, never sent to the client.
    #[error("{0}")]
    Storage(String),
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Validation(message) => Self::Validation(message),
            TrackerError::Forbidden(message) => Self::Forbidden(message),
            TrackerError::NotFound(message) => Self::NotFound(message),
            TrackerError::Storage(e) => Self::Storage(e.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Validation(_) | IdentityError::DuplicateUser(_) => {
                Self::Validation(err.to_string())
            }
            IdentityError::InvalidCredentials | IdentityError::Unauthenticated => {
                Self::Unauthenticated(err.to_string())
            }
            IdentityError::Hashing(_) | IdentityError::Persistence(_) => {
                Self::Storage(err.to_string())
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Self::Storage(detail) => {
                error!("Request failed in storage: {}", detail);
                STORAGE_FAILURE_MESSAGE.to_owned()
            }
            other => {
                info!("Request rejected: {}", other);
                other.to_string()
            }
        };
        HttpResponse::build(self.status_code()).json(MessageResponse {
            success: false,
            message,
        })
    }
}
