use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::utils::api_response::ApiResponse;

/// Rewrite error responses produced outside the handlers (timeouts, body
/// limits, unmatched routes) into the JSON envelope. Headers are kept.
pub async fn envelope_bare_errors(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    let (_, body) = ApiResponse::from_status(status).into_response().into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_ENCODING);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, body)
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}
