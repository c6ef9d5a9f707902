use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

/// Log method, path, status and latency of every request.
pub async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    let latency_ms = start.elapsed().as_millis() as u64;

    // Errors are logged separately so they stand out in the log file.
    if status.is_client_error() || status.is_server_error() {
        warn!(%method, %path, status = status.as_u16(), latency_ms, "request failed");
    } else {
        info!(%method, %path, status = status.as_u16(), latency_ms, "request served");
    }

    response
}
