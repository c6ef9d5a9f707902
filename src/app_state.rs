use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::config::Config;
use crate::middleware::auth::{create_person_cache, PersonCache};
use crate::middleware::permissions::RoutePermissions;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub person_cache: PersonCache,
    pub permissions: Arc<RoutePermissions>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let person_cache = create_person_cache(Duration::from_secs(config.person_cache_ttl_secs));
        Self {
            pool,
            config: Arc::new(config),
            person_cache,
            permissions: Arc::new(RoutePermissions::standard()),
        }
    }
}
