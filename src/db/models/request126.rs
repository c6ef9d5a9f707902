use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use super::person::{PersonSummary, Role};

/// Workflow position of a request. `Nowhere` only appears as the
/// `fromStatus` of the creation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workflow_status", rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum WorkflowStatus {
    Nowhere,
    Draft,
    PendingAssign,
    PendingReview,
    PendingDecision,
    Approved,
    Rejected,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Nowhere => "nowhere",
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::PendingAssign => "pendingAssign",
            WorkflowStatus::PendingReview => "pendingReview",
            WorkflowStatus::PendingDecision => "pendingDecision",
            WorkflowStatus::Approved => "approved",
            WorkflowStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Approved | WorkflowStatus::Rejected)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request126_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Create,
    Submit,
    Assign,
    /// Reviewer sends the request back to the manager.
    Review,
    Approve,
    Reject,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Create => "create",
            HistoryAction::Submit => "submit",
            HistoryAction::Assign => "assign",
            HistoryAction::Review => "review",
            HistoryAction::Approve => "approve",
            HistoryAction::Reject => "reject",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Request126 {
    pub id: i32,
    pub request_type: String,
    pub company_id: i32,
    pub line_id: i32,
    pub drug_id: i32,
    pub oeb: Option<i32>,
    pub oel: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// One immutable audit row. The newest row per request defines its status.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Request126History {
    pub id: i32,
    pub request_id: i32,
    pub actor_id: i32,
    pub action: HistoryAction,
    pub from_status: WorkflowStatus,
    pub to_status: WorkflowStatus,
    pub to_assignee_id: i32,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// History row about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub request_id: i32,
    pub actor_id: i32,
    pub action: HistoryAction,
    pub from_status: WorkflowStatus,
    pub to_status: WorkflowStatus,
    pub to_assignee_id: i32,
    pub message: Option<String>,
    pub ended: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest126 {
    pub request_type: String,
    pub company_id: i32,
    pub line_id: i32,
    pub drug_id: i32,
    pub oeb: Option<i32>,
    pub oel: Option<BigDecimal>,
}

/// Administrative patch; never touches history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest126 {
    pub oeb: Option<i32>,
    pub oel: Option<BigDecimal>,
    pub closed: Option<bool>,
}

impl UpdateRequest126 {
    pub fn is_empty(&self) -> bool {
        self.oeb.is_none() && self.oel.is_none() && self.closed.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPayload {
    pub person_id: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request126Filter {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_closed: bool,
}

/// Request row joined with its company/line/drug names and the
/// status/assignee taken from its latest history row.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Request126Row {
    pub id: i32,
    pub request_type: String,
    pub company_id: i32,
    pub company_name: String,
    pub line_id: i32,
    pub line_name: String,
    pub drug_id: i32,
    pub drug_name: String,
    pub oeb: Option<i32>,
    pub oel: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub status: Option<WorkflowStatus>,
    pub assignee_id: Option<i32>,
}

/// History row joined with the actor and assignee persons.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryWithPeopleRow {
    pub id: i32,
    pub request_id: i32,
    pub actor_id: i32,
    pub actor_name: String,
    pub actor_role: Role,
    pub action: HistoryAction,
    pub from_status: WorkflowStatus,
    pub to_status: WorkflowStatus,
    pub to_assignee_id: i32,
    pub assignee_name: String,
    pub assignee_role: Role,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDetail {
    pub id: i32,
    pub action: HistoryAction,
    pub from_status: WorkflowStatus,
    pub to_status: WorkflowStatus,
    pub actor: PersonSummary,
    pub to_assignee: PersonSummary,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<HistoryWithPeopleRow> for HistoryDetail {
    fn from(row: HistoryWithPeopleRow) -> Self {
        HistoryDetail {
            id: row.id,
            action: row.action,
            from_status: row.from_status,
            to_status: row.to_status,
            actor: PersonSummary {
                id: row.actor_id,
                name: row.actor_name,
                role: row.actor_role,
            },
            to_assignee: PersonSummary {
                id: row.to_assignee_id,
                name: row.assignee_name,
                role: row.assignee_role,
            },
            message: row.message,
            created_at: row.created_at,
            ended_at: row.ended_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request126Detail {
    #[serde(flatten)]
    pub request: Request126Row,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryDetail>>,
}

/// Result of a successful creation: the request and its first history row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRequest126 {
    pub request: Request126,
    pub history: Request126History,
}
