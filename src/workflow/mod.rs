//! Request126 approval workflow.
//!
//! A request's status is never stored on the request itself: it is the
//! `toStatus` of the newest row in its history. Every action appends exactly
//! one row, after checking it against the [`transitions`] table, inside a
//! single database transaction.

pub mod engine;
pub mod store;
pub mod transitions;

#[cfg(test)]
mod memory;

use crate::db::models::person::Role;
use crate::db::models::request126::{HistoryAction, WorkflowStatus};

pub use engine::Command;
pub use store::{PgWorkflowStore, WorkflowStore};
pub use transitions::{transition_for, AssigneeRule, Transition};

/// Business-rule violations. All of them are the caller's fault and map to 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Role {role} is not allowed to {action} a request")]
    RoleNotPermitted { action: HistoryAction, role: Role },

    #[error("Cannot {action} a request in status {actual}; expected {expected}")]
    InvalidState {
        action: HistoryAction,
        expected: WorkflowStatus,
        actual: WorkflowStatus,
    },

    #[error("Only the current assignee may {action} this request")]
    NotCurrentAssignee { action: HistoryAction },

    #[error("Request {request_id} has no history")]
    MissingHistory { request_id: i32 },

    #[error("No IFDAMANAGER is available to take the request")]
    NoManagerAvailable,

    #[error("Person {person_id} does not exist")]
    AssigneeNotFound { person_id: i32 },

    #[error("Person {person_id} has role {role}; only an IFDAUSER can be assigned")]
    AssigneeNotReviewer { person_id: i32, role: Role },
}
