use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSON envelope shared by every success and error response:
/// `{success, statusCode, message, timestamp, data?, errors?}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl<T> ApiResponse<T> {
    fn new(status: StatusCode, message: String, data: Option<T>) -> Self {
        ApiResponse {
            success: !(status.is_client_error() || status.is_server_error()),
            status_code: status.as_u16(),
            message,
            timestamp: Utc::now(),
            data,
            errors: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self::new(status, message.into(), Some(data))
    }
}

impl ApiResponse<()> {
    /// Error envelope; `errors` carries optional structured detail.
    pub fn error(
        status: StatusCode,
        message: impl Into<String>,
        errors: Option<serde_json::Value>,
    ) -> Self {
        ApiResponse {
            success: false,
            errors,
            ..Self::new(status, message.into(), None)
        }
    }

    /// Error envelope for a bare status, worded with its canonical reason.
    pub fn from_status(status: StatusCode) -> Self {
        Self::error(status, status.canonical_reason().unwrap_or("Request failed"), None)
    }
}
