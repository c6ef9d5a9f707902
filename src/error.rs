use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::utils::api_response::ApiResponse;
use crate::workflow::WorkflowError;

/// Application-level error type for HTTP handlers.
///
/// Business-rule violations from the workflow surface as 400s with their own
/// message; storage errors are classified the same way for every route.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Request body, path or query string could not be decoded.
    #[error("{message}: {detail}")]
    InvalidInput { message: String, detail: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput {
            message: "Invalid request body".into(),
            detail: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidInput {
            message: "Invalid path parameter".into(),
            detail: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput {
            message: "Invalid query string".into(),
            detail: rejection.body_text(),
        }
    }
}

impl From<AppError> for ApiResponse<()> {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Workflow(err) => {
                ApiResponse::error(StatusCode::BAD_REQUEST, err.to_string(), None)
            }
            AppError::Database(err) => {
                let (status, message) = classify_sqlx_error(&err);
                ApiResponse::error(status, message, None)
            }
            AppError::InvalidInput { message, detail } => ApiResponse::error(
                StatusCode::BAD_REQUEST,
                message,
                Some(json!({ "detail": detail })),
            ),
            AppError::NotFound(msg) => ApiResponse::error(StatusCode::NOT_FOUND, msg, None),
            AppError::BadRequest(msg) => ApiResponse::error(StatusCode::BAD_REQUEST, msg, None),
            AppError::Unauthorized(msg) => ApiResponse::error(StatusCode::UNAUTHORIZED, msg, None),
            AppError::Forbidden(msg) => ApiResponse::error(StatusCode::FORBIDDEN, msg, None),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiResponse::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred",
                    None,
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiResponse::from(self).into_response()
    }
}

/// Map a sqlx error to an HTTP status and client-facing message.
///
/// - Unique violations (`23505`) map to 409.
/// - `RowNotFound` maps to 404.
/// - Everything else maps to 400 "Database error".
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, String) {
    match err {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "Record not found".to_string()),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            (
                StatusCode::CONFLICT,
                format!("Unique constraint failed: {constraint}"),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (StatusCode::BAD_REQUEST, "Database error".to_string())
        }
    }
}
