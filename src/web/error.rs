//! JSON error responses

use crate::error::SuggestError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// A single rejected request parameter
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<Violation>,
}

/// Error rendered as `{error, message, violations}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    violations: Vec<Violation>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            violations: Vec::new(),
        }
    }

    pub fn validation(violations: Vec<Violation>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Request validation failed".to_string(),
            violations,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<SuggestError> for ApiError {
    fn from(err: SuggestError) -> Self {
        let status = match &err {
            SuggestError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            SuggestError::NotFound(_) => StatusCode::NOT_FOUND,
            SuggestError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            SuggestError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: self.message,
            violations: self.violations,
        };
        (self.status, Json(body)).into_response()
    }
}
