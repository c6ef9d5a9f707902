use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::db::queries::request126::*;

pub const REQUESTS: &str = "/request126";
pub const REQUEST_BY_ID: &str = "/request126/{request_id}";
pub const REQUEST_HISTORY: &str = "/request126/{request_id}/history";
pub const REQUEST_SUBMIT: &str = "/request126/{request_id}/submit";
pub const REQUEST_ASSIGN: &str = "/request126/{request_id}/assign";
pub const REQUEST_SEND_BACK: &str = "/request126/{request_id}/send-back";
pub const REQUEST_APPROVE: &str = "/request126/{request_id}/approve";
pub const REQUEST_REJECT: &str = "/request126/{request_id}/reject";

pub fn request126_routes() -> Router<AppState> {
    Router::new()
        .route(REQUESTS, post(create_request126).get(get_requests126))
        .route(
            REQUEST_BY_ID,
            get(get_request126)
                .patch(update_request126)
                .delete(delete_request126),
        )
        .route(REQUEST_HISTORY, get(get_request126_history))
        .route(REQUEST_SUBMIT, post(submit_request126))
        .route(REQUEST_ASSIGN, post(assign_request126))
        .route(REQUEST_SEND_BACK, post(send_back_request126))
        .route(REQUEST_APPROVE, post(approve_request126))
        .route(REQUEST_REJECT, post(reject_request126))
}
