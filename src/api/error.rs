//! API error handling for consistent JSON error responses.

use crate::error::AppError;
use crate::utils::logging;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// API error type that converts to JSON responses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Unauthorized(message) => Self::new(StatusCode::UNAUTHORIZED, message),
            AppError::NotFound(message) => Self::new(StatusCode::NOT_FOUND, message),
            AppError::InvalidInput(message) => Self::new(StatusCode::BAD_REQUEST, message),
            AppError::Config(message) => {
                log::error!("Configuration problem surfaced to a request: {}", message);
                Self::internal(message)
            }
            AppError::Provider(_) | AppError::ProviderTimeout(_) => {
                log::warn!("Call provider failure: {}", err);
                Self::new(StatusCode::BAD_GATEWAY, err.to_safe_string())
            }
            AppError::Anyhow(ref inner) => {
                logging::log_error_with_context(inner, "request");
                Self::internal(err.to_safe_string())
            }
            AppError::Database(_) | AppError::Network(_) => {
                log::error!("Request failed: {}", err);
                Self::internal(err.to_safe_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err).into()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
