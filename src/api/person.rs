use axum::{routing::get, Router};

use crate::app_state::AppState;
use crate::db::queries::person::{get_person, get_persons};

pub const PERSONS: &str = "/persons";
pub const PERSON_BY_ID: &str = "/persons/{person_id}";

pub fn person_routes() -> Router<AppState> {
    Router::new()
        .route(PERSONS, get(get_persons))
        .route(PERSON_BY_ID, get(get_person))
}
