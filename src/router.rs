use std::time::Duration;

use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state, map_response};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::api;
use crate::app_state::AppState;
use crate::middleware::auth::{authorize_middleware, jwt_middleware};
use crate::middleware::error_envelope::envelope_bare_errors;
use crate::middleware::permissions::API_PREFIX;
use crate::middleware::request_logger::log_requests;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Full application router: public health checks plus the guarded `/api`.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    // Route layers run bottom-up: the JWT check happens before authorization.
    let private_routes = Router::new()
        .merge(api::request126::request126_routes())
        .merge(api::person::person_routes())
        .route_layer(from_fn_with_state(state.clone(), authorize_middleware))
        .route_layer(from_fn_with_state(state.clone(), jwt_middleware));

    Router::new()
        .merge(api::health::health_routes())
        .nest(API_PREFIX, private_routes)
        .layer(from_fn(log_requests))
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(map_response(envelope_bare_errors))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
