use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::json;
use sqlx::PgPool;
use tracing::error;

use crate::app_state::AppState;

/// Defines health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health/live", get(liveness_check))
        .route("/health/ready", get(readiness_check))
}

/// **Liveness Check**: the process is up; the database is not consulted.
async fn liveness_check() -> Json<serde_json::Value> {
    Json(json!({ "success": true, "message": "API is live" }))
}

/// **Readiness Check**: `503` while the database is unreachable.
async fn readiness_check(
    State(pool): State<PgPool>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    sqlx::query("SELECT 1")
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            error!("Readiness check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "message": "Database unavailable" })),
            )
        })?;

    Ok(Json(json!({ "success": true, "message": "API is ready" })))
}
