use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, ToSchema)]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    #[serde(rename = "AUTH_1001")]
    SignatureMissing,
    #[serde(rename = "AUTH_1002")]
    SignatureInvalid,

    // Internal errors (9xxx)
    #[serde(rename = "INT_9999")]
    InternalServerError,
}

impl ErrorCode {
    /// Get numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::SignatureMissing => 1001,
            ErrorCode::SignatureInvalid => 1002,
            ErrorCode::InternalServerError => 9999,
        }
    }

    /// Get user-facing message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::SignatureMissing => "Missing signature",
            ErrorCode::SignatureInvalid => "Invalid signature",
            ErrorCode::InternalServerError => "An internal server error occurred",
        }
    }
}

/// Structured error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub request_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub code_number: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing signature")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    /// The detail is logged but never sent to the caller.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get error code
    fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::MissingSignature => ErrorCode::SignatureMissing,
            ApiError::InvalidSignature => ErrorCode::SignatureInvalid,
            ApiError::Internal(_) => ErrorCode::InternalServerError,
        }
    }

    /// Get status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingSignature | ApiError::InvalidSignature => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log error with appropriate level
    fn log_error(&self, request_id: &str) {
        match self.status_code() {
            status if status.is_server_error() => {
                error!(
                    request_id = %request_id,
                    error = %self,
                    "Server error occurred"
                );
            }
            status if status.is_client_error() => {
                warn!(
                    request_id = %request_id,
                    error = %self,
                    "Client error occurred"
                );
            }
            _ => {}
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let status = self.status_code();
        let code = self.error_code();

        self.log_error(&request_id);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code,
                code_number: code.code(),
                message: code.message().to_string(),
            },
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}
