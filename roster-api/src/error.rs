/// Error handling for the API server
///
/// Every handler returns `Result<T, ApiError>`. This module is the single
/// place where failures become HTTP responses:
///
/// | Variant | Status | `error` code |
/// |---|---|---|
/// | `Validation` | 400 | `validation_error` |
/// | `InvalidBody` | 400 | `invalid_body` |
/// | `InvalidId` | 400 | `invalid_id` |
/// | `NotFound`, `RouteNotFound` | 404 | `not_found` |
/// | `Duplicate` | 409 | `duplicate_key` |
/// | `ServiceUnavailable` | 503 | `service_unavailable` |
/// | `Internal` | 500 | `internal_error` |
///
/// Internal error details are logged and never sent to the client.
///
/// # Example
///
/// ```
/// use roster_api::error::{ApiError, ApiResult};
/// use axum::Json;
///
/// async fn handler() -> ApiResult<Json<serde_json::Value>> {
///     Err(ApiError::NotFound)
/// }
/// ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roster_shared::{FieldError, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// One or more fields violated the schema (400)
    #[error("Validation failed: {} errors", .0.len())]
    Validation(Vec<FieldError>),

    /// The request body is not a JSON object of the expected shape (400)
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// The path id is not well formed (400)
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// No user has the given id (404)
    #[error("User not found")]
    NotFound,

    /// No route matches under `/api` (404)
    #[error("Route not found")]
    RouteNotFound,

    /// Unique index conflict, e.g. duplicate email (409)
    #[error("Duplicate key: {key} = {value}")]
    Duplicate { key: String, value: String },

    /// The store is not connected (503)
    #[error("Service unavailable")]
    ServiceUnavailable,

    /// Anything unclassified (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "validation_error", "not_found")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Per-field validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,

    /// Conflicting key and value for duplicate-key errors
    #[serde(rename = "keyValue", skip_serializing_if = "Option::is_none")]
    pub key_value: Option<Map<String, Value>>,
}

/// Message returned while the store is not connected
pub const UNAVAILABLE_MESSAGE: &str = "Database unavailable. Please try again shortly.";

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidBody(_) | ApiError::InvalidId(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Duplicate { .. } => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Validation(errors) => ErrorResponse {
                error: "validation_error".to_string(),
                message: "Validation error".to_string(),
                details: Some(errors),
                key_value: None,
            },
            ApiError::InvalidBody(msg) => ErrorResponse {
                error: "invalid_body".to_string(),
                message: msg,
                details: None,
                key_value: None,
            },
            ApiError::InvalidId(id) => {
                tracing::debug!(id = %id, "Rejected malformed id");
                ErrorResponse {
                    error: "invalid_id".to_string(),
                    message: "Invalid ID format".to_string(),
                    details: None,
                    key_value: None,
                }
            }
            ApiError::NotFound => ErrorResponse {
                error: "not_found".to_string(),
                message: "User not found".to_string(),
                details: None,
                key_value: None,
            },
            ApiError::RouteNotFound => ErrorResponse {
                error: "not_found".to_string(),
                message: "Route not found".to_string(),
                details: None,
                key_value: None,
            },
            ApiError::Duplicate { key, value } => {
                let mut key_value = Map::new();
                key_value.insert(key, Value::String(value));
                ErrorResponse {
                    error: "duplicate_key".to_string(),
                    message: "Duplicate key".to_string(),
                    details: None,
                    key_value: Some(key_value),
                }
            }
            ApiError::ServiceUnavailable => ErrorResponse {
                error: "service_unavailable".to_string(),
                message: UNAVAILABLE_MESSAGE.to_string(),
                details: None,
                key_value: None,
            },
            ApiError::Internal(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ErrorResponse {
                    error: "internal_error".to_string(),
                    message: "Server error".to_string(),
                    details: None,
                    key_value: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Convert persistence errors to API errors
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(failure) => ApiError::Validation(failure.into_errors()),
            StoreError::InvalidId(id) => ApiError::InvalidId(id),
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Duplicate { key, value } => ApiError::Duplicate { key, value },
            StoreError::Unavailable => ApiError::ServiceUnavailable,
            StoreError::Database(msg) => ApiError::Internal(msg),
        }
    }
}

/// Convert JSON body rejections to API errors
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}
