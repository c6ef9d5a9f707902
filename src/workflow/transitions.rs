use crate::db::models::person::Role;
use crate::db::models::request126::{HistoryAction, WorkflowStatus};
use crate::middleware::auth::Actor;

use super::WorkflowError;

/// How the assignee of the appended history row is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeRule {
    /// The first IFDAMANAGER by id.
    FirstManager,
    /// Same assignee as the latest row.
    Unchanged,
    /// The IFDAUSER named in the command.
    ChosenReviewer,
    /// Whoever performed the first `assign`, else the first IFDAMANAGER.
    AssigningManager,
}

/// One row of the transition table.
#[derive(Debug)]
pub struct Transition {
    pub action: HistoryAction,
    pub roles: &'static [Role],
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub assignee: AssigneeRule,
    pub requires_current_assignee: bool,
}

static CREATE: Transition = Transition {
    action: HistoryAction::Create,
    roles: &[Role::Qrp, Role::System],
    from: WorkflowStatus::Nowhere,
    to: WorkflowStatus::Draft,
    assignee: AssigneeRule::FirstManager,
    requires_current_assignee: false,
};

static SUBMIT: Transition = Transition {
    action: HistoryAction::Submit,
    roles: &[Role::Qrp],
    from: WorkflowStatus::Draft,
    to: WorkflowStatus::PendingAssign,
    assignee: AssigneeRule::Unchanged,
    requires_current_assignee: false,
};

static ASSIGN: Transition = Transition {
    action: HistoryAction::Assign,
    roles: &[Role::IfdaManager, Role::System],
    from: WorkflowStatus::PendingAssign,
    to: WorkflowStatus::PendingReview,
    assignee: AssigneeRule::ChosenReviewer,
    requires_current_assignee: false,
};

static REVIEW: Transition = Transition {
    action: HistoryAction::Review,
    roles: &[Role::IfdaUser, Role::System],
    from: WorkflowStatus::PendingReview,
    to: WorkflowStatus::PendingDecision,
    assignee: AssigneeRule::AssigningManager,
    requires_current_assignee: true,
};

static APPROVE: Transition = Transition {
    action: HistoryAction::Approve,
    roles: &[Role::IfdaManager, Role::System],
    from: WorkflowStatus::PendingDecision,
    to: WorkflowStatus::Approved,
    assignee: AssigneeRule::Unchanged,
    requires_current_assignee: true,
};

static REJECT: Transition = Transition {
    action: HistoryAction::Reject,
    roles: &[Role::IfdaManager, Role::System],
    from: WorkflowStatus::PendingDecision,
    to: WorkflowStatus::Rejected,
    assignee: AssigneeRule::Unchanged,
    requires_current_assignee: true,
};

/// Look up the table row for an action.
pub fn transition_for(action: HistoryAction) -> &'static Transition {
    match action {
        HistoryAction::Create => &CREATE,
        HistoryAction::Submit => &SUBMIT,
        HistoryAction::Assign => &ASSIGN,
        HistoryAction::Review => &REVIEW,
        HistoryAction::Approve => &APPROVE,
        HistoryAction::Reject => &REJECT,
    }
}

impl Transition {
    pub fn permits_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Validate the move from `current` (with its assignee, if any) for `actor`.
    /// Checks run in order: precondition state, role, current assignee.
    pub fn check(
        &self,
        current: WorkflowStatus,
        current_assignee: Option<i32>,
        actor: &Actor,
    ) -> Result<(), WorkflowError> {
        if current != self.from {
            return Err(WorkflowError::InvalidState {
                action: self.action,
                expected: self.from,
                actual: current,
            });
        }
        if !self.permits_role(actor.role) {
            return Err(WorkflowError::RoleNotPermitted {
                action: self.action,
                role: actor.role,
            });
        }
        if self.requires_current_assignee && current_assignee != Some(actor.id) {
            return Err(WorkflowError::NotCurrentAssignee {
                action: self.action,
            });
        }
        Ok(())
    }
}
