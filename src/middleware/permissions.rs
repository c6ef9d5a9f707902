use axum::http::Method;
use tracing::warn;

use crate::api::person::{PERSONS, PERSON_BY_ID};
use crate::api::request126::{
    REQUESTS, REQUEST_APPROVE, REQUEST_ASSIGN, REQUEST_BY_ID, REQUEST_HISTORY, REQUEST_REJECT,
    REQUEST_SEND_BACK, REQUEST_SUBMIT,
};
use crate::db::models::person::Role;
use crate::db::models::request126::HistoryAction;
use crate::error::AppError;
use crate::workflow::transition_for;

/// Prefix the private API is nested under; permission paths omit it.
pub const API_PREFIX: &str = "/api";

const EVERYONE: &[Role] = &Role::ALL;
const ADMINISTRATORS: &[Role] = &[Role::IfdaManager, Role::System];
const SYSTEM_ONLY: &[Role] = &[Role::System];

#[derive(Debug, Clone)]
pub struct RoutePermission {
    pub method: Method,
    pub path: &'static str,
    pub roles: &'static [Role],
}

/// Explicit `(method, route pattern) -> roles` table checked by
/// [`authorize_middleware`](super::auth::authorize_middleware). Routes that
/// are not listed are denied.
#[derive(Debug, Clone, Default)]
pub struct RoutePermissions {
    entries: Vec<RoutePermission>,
}

impl RoutePermissions {
    pub fn allow(mut self, method: Method, path: &'static str, roles: &'static [Role]) -> Self {
        self.entries.push(RoutePermission { method, path, roles });
        self
    }

    /// Permissions for every private route this service exposes. Workflow
    /// action routes reuse the role lists of the transition table.
    pub fn standard() -> Self {
        let action_roles = |action| transition_for(action).roles;

        Self::default()
            .allow(Method::POST, REQUESTS, action_roles(HistoryAction::Create))
            .allow(Method::GET, REQUESTS, EVERYONE)
            .allow(Method::GET, REQUEST_BY_ID, EVERYONE)
            .allow(Method::GET, REQUEST_HISTORY, EVERYONE)
            .allow(Method::PATCH, REQUEST_BY_ID, ADMINISTRATORS)
            .allow(Method::DELETE, REQUEST_BY_ID, SYSTEM_ONLY)
            .allow(Method::POST, REQUEST_SUBMIT, action_roles(HistoryAction::Submit))
            .allow(Method::POST, REQUEST_ASSIGN, action_roles(HistoryAction::Assign))
            .allow(Method::POST, REQUEST_SEND_BACK, action_roles(HistoryAction::Review))
            .allow(Method::POST, REQUEST_APPROVE, action_roles(HistoryAction::Approve))
            .allow(Method::POST, REQUEST_REJECT, action_roles(HistoryAction::Reject))
            .allow(Method::GET, PERSONS, EVERYONE)
            .allow(Method::GET, PERSON_BY_ID, EVERYONE)
    }

    pub fn allowed_roles(&self, method: &Method, path: &str) -> Option<&'static [Role]> {
        let path = path.strip_prefix(API_PREFIX).unwrap_or(path);
        self.entries
            .iter()
            .find(|entry| entry.method == *method && entry.path == path)
            .map(|entry| entry.roles)
    }

    pub fn authorize(&self, method: &Method, path: &str, role: Role) -> Result<(), AppError> {
        match self.allowed_roles(method, path) {
            Some(roles) if roles.contains(&role) => Ok(()),
            Some(_) => {
                warn!(%method, path, %role, "Role not permitted on route");
                Err(AppError::Forbidden(format!(
                    "Role {role} may not access {method} {path}"
                )))
            }
            None => {
                warn!(%method, path, "Route has no permission entry");
                Err(AppError::Forbidden(format!(
                    "No permission entry for {method} {path}"
                )))
            }
        }
    }
}
