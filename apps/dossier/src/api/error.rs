//! # API Errors
//!
//! Maps registry errors onto HTTP status codes. Every error body is
//! `{"error": "<message>"}`.

use super::types::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dossier_core::DossierError;

/// A failed request.
#[derive(Debug)]
pub enum ApiError {
    /// An error raised by the registry.
    Core(DossierError),
    /// No entity answers to the given id or slug.
    NotFound(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<DossierError> for ApiError {
    fn from(err: DossierError) -> Self {
        ApiError::Core(err)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Core(err) => match err {
                DossierError::EntityNotFound(_) | DossierError::RelationshipNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                DossierError::SlugTaken(_) => StatusCode::CONFLICT,
                DossierError::Validation(_)
                | DossierError::MalformedRow(_)
                | DossierError::ConfirmationRequired(_) => StatusCode::BAD_REQUEST,
                DossierError::SerializationError(_) | DossierError::IoError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Core(err) => err.to_string(),
            ApiError::NotFound(key) => format!("Entity not found: {}", key),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        } else {
            tracing::debug!(%status, error = %message, "request rejected");
        }
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
