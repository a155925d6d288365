//! HTTP error type and JSON error envelope

use crate::db::DbError;
use crate::services::ProviderError;
use crate::validation::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Handler result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request body too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: usize },

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database operation failed")]
    Database(#[from] DbError),

    #[error("Upstream provider request failed")]
    Provider(#[from] ProviderError),

    #[error("Internal server error")]
    Internal(String),
}

/// Error envelope. `details` is filled in by the error-details middleware
/// outside production.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Response extension carrying the diagnostic text for an error response
#[derive(Debug, Clone)]
pub struct ErrorDetails(pub String);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Validation(_) | ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(DbError::NotInitialized) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Diagnostic text for server-side failures; client errors carry none
    fn details(&self) -> Option<String> {
        match self {
            ApiError::Database(e) => Some(format!("{:?}", e)),
            ApiError::Provider(e) => Some(format!("{:?}", e)),
            ApiError::Internal(msg) => Some(msg.clone()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = ?self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            details: None,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(details) = self.details() {
            response.extensions_mut().insert(ErrorDetails(details));
        }
        response
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Task join error: {}", err))
    }
}
