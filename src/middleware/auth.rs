use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::app_state::AppState;
use crate::db::models::person::{Person, Role};
use crate::db::queries::person::fetch_person;
use crate::error::AppError;

/// Person rows keyed by id, so the guard does not hit the database on every
/// request.
pub type PersonCache = Arc<Cache<i32, Person>>;

pub fn create_person_cache(ttl: Duration) -> PersonCache {
    Arc::new(Cache::builder().time_to_live(ttl).max_capacity(10_000).build())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompanyRef {
    pub id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompanyClaim {
    pub company: CompanyRef,
}

/// JWT payload issued by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Person id
    pub id: i32,
    pub role: Role,
    #[serde(default)]
    pub companies: Vec<CompanyClaim>,
    /// Expiration timestamp (UNIX time)
    pub exp: usize,
}

impl Claims {
    pub fn company_ids(&self) -> Vec<i32> {
        self.companies.iter().map(|c| c.company.id).collect()
    }
}

/// The authenticated person a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
    pub role: Role,
    pub company_ids: Vec<i32>,
}

impl Actor {
    pub fn belongs_to(&self, company_id: i32) -> bool {
        self.company_ids.contains(&company_id)
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// **JWT Middleware**: verifies the bearer token and stores its [`Claims`].
pub async fn jwt_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| {
            debug!("Missing Authorization header");
            AppError::Unauthorized("Missing Authorization header".into())
        })?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header format".into()))?;

    let token = bearer_token(auth_header).ok_or_else(|| {
        AppError::Unauthorized("Invalid token format (missing 'Bearer ' prefix)".into())
    })?;

    let claims = decode_token(token, &state.config.jwt_secret).map_err(|e| {
        warn!("JWT decoding failed: {e}");
        AppError::Unauthorized("Invalid token".into())
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// **Authorization Middleware**: resolves the [`Actor`] behind the token and
/// checks the route permission table.
///
/// The person's stored role wins over the role in the token, so a demoted
/// person loses access once the cache entry expires.
pub async fn authorize_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        AppError::Unauthorized("Missing JWT claims in request".into())
    })?;

    let person = match state.person_cache.get(&claims.id) {
        Some(person) => person,
        None => {
            let person = fetch_person(&state.pool, claims.id)
                .await?
                .ok_or_else(|| {
                    warn!(person_id = claims.id, "Token refers to an unknown person");
                    AppError::Unauthorized("Unknown person".into())
                })?;
            state.person_cache.insert(claims.id, person.clone());
            person
        }
    };

    if person.role != claims.role {
        debug!(
            person_id = person.id,
            token_role = %claims.role,
            stored_role = %person.role,
            "Token role differs from stored role"
        );
    }

    let actor = Actor {
        id: person.id,
        role: person.role,
        company_ids: claims.company_ids(),
    };

    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    state.permissions.authorize(req.method(), &path, actor.role)?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
