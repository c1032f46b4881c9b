//! Error handling module
//!
//! Provides unified error types and handling for the entire application.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Local input problem, resolved before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid snapshot name: {0}")]
    InvalidName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Upstream refused the credentials (401/403 without a policy code)
    #[error("Unauthorized (HTTP {status})")]
    Unauthorized { status: u16, body: String },

    /// Upstream 5xx, timeout or transport failure. `status` is `None` when
    /// no response was received at all.
    #[error("Upstream server error: {}", format_status(.status))]
    Upstream { status: Option<u16>, body: String },

    #[error("Malformed upstream response (HTTP {status})")]
    MalformedResponse { status: u16, body: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "no response".to_string(),
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Storage(format!("SQLite error: {}", e))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", e))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        let body = if e.is_timeout() {
            format!("request timed out: {}", e)
        } else {
            e.to_string()
        };
        AppError::Upstream {
            status: e.status().map(|s| s.as_u16()),
            body,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "upstreamStatus", skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut upstream_status = None;
        let (status, error_code, message, details) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::InvalidName(msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_NAME",
                msg.clone(),
                None,
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                None,
            ),
            AppError::Unauthorized { status, body } => {
                upstream_status = Some(*status);
                (
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::FORBIDDEN),
                    "UNAUTHORIZED",
                    "Upstream function rejected the request (401/403)".to_string(),
                    Some(body.clone()),
                )
            }
            AppError::Upstream { status, body } => {
                error!("Upstream error ({}): {}", format_status(status), body);
                upstream_status = *status;
                (
                    StatusCode::BAD_GATEWAY,
                    "SERVER_ERROR",
                    "Upstream function failed".to_string(),
                    Some(body.clone()),
                )
            }
            AppError::MalformedResponse { status, body } => {
                error!("Malformed upstream response (HTTP {}): {}", status, body);
                upstream_status = Some(*status);
                (
                    StatusCode::BAD_GATEWAY,
                    "MALFORMED_RESPONSE",
                    "Unexpected response shape from upstream function".to_string(),
                    Some(body.clone()),
                )
            }
            AppError::Storage(msg) => {
                error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Config(msg) => {
                error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    "A configuration error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(error_code.to_string()),
            upstream_status,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_keeps_upstream_status() {
        let response = AppError::Unauthorized {
            status: 401,
            body: "{\"error\":\"bad key\"}".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_upstream_maps_to_bad_gateway() {
        let response = AppError::Upstream {
            status: None,
            body: "timed out".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_not_found_status() {
        let response = AppError::NotFound("Snapshot 'x' not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_upstream_display_without_status() {
        let err = AppError::Upstream {
            status: None,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "Upstream server error: no response");
    }
}
