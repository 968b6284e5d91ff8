use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;
use validator::ValidationErrors;

use crate::bookkeeping::services::ResourceError;

#[derive(Serialize)]
pub struct ErrorRep {
    pub message: String,
}

#[derive(Serialize)]
pub struct ValidationErrorRep {
    pub message: String,
    pub errors: ValidationErrors,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden,
    InternalServerError,
    NotFound(String),
    ValidationFailed(ValidationErrors),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "You do not have access to this resource.".to_owned(),
            ),
            Self::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error.".to_owned(),
            ),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::ValidationFailed(errors) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ValidationErrorRep {
                        message: "Validation failed.".to_owned(),
                        errors,
                    }),
                )
                    .into_response()
            }
        };

        (status, Json(ErrorRep { message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        error!(?error, "Received error.");

        Self::InternalServerError
    }
}

impl From<ResourceError> for ApiError {
    fn from(error: ResourceError) -> Self {
        match error {
            ResourceError::Validation(errors) => Self::ValidationFailed(errors),
            ResourceError::InvalidId(error) => Self::BadRequest(error.to_string()),
            error @ ResourceError::InvalidReference { .. } => Self::BadRequest(error.to_string()),
            ResourceError::InvalidSort(error) => Self::BadRequest(error.to_string()),
            ResourceError::NotFound(name) => Self::NotFound(format!("{} not found.", name)),
            ResourceError::Forbidden => Self::Forbidden,
            ResourceError::Store(error) => error.into(),
        }
    }
}

pub type ApiResponse<T> = Result<T, ApiError>;
