//! Error response formatting
//!
//! Every failed API call answers with the same JSON envelope, so the
//! front end can branch on `success` and `error` alone.

use crate::error::{AppError, AppErrorKind, ErrorCode, ExternalError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standardized error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,

    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Request ID for debugging and support
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Gateway-reported code, when the bank returned one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Whether the client may try again
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            success: false,
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            details: gateway_details(error),
            retryable: Some(error.is_retryable()),
        }
    }
}

fn gateway_details(error: &AppError) -> Option<serde_json::Value> {
    match &error.kind {
        AppErrorKind::External(ExternalError::Gateway {
            provider,
            provider_code: Some(code),
            ..
        }) => Some(serde_json::json!({
            "provider": provider,
            "provider_code": code,
        })),
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = %self,
                detail = ?self.detail(),
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::warn!(
                error = %self,
                detail = ?self.detail(),
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Client error occurred"
            );
        }

        let error_response = ErrorResponse::from_app_error(&self);
        (status_code, Json(error_response)).into_response()
    }
}

/// Wraps `data` in the `{success: true, data, message}` envelope.
pub fn success_response<T: Serialize>(data: T, message: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "data": data,
        "message": message,
    }))
}

pub fn get_request_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
