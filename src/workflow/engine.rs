use tracing::{info, warn};

use crate::db::models::person::Role;
use crate::db::models::request126::{
    CreatedRequest126, HistoryAction, NewHistoryEntry, NewRequest126, Request126History,
    WorkflowStatus,
};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Actor;

use super::store::WorkflowStore;
use super::transitions::{transition_for, AssigneeRule};
use super::WorkflowError;

/// Workflow actions on an existing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit,
    Assign { person_id: i32 },
    SendBackToManager { message: Option<String> },
    Approve { message: Option<String> },
    Reject { message: Option<String> },
}

impl Command {
    pub fn action(&self) -> HistoryAction {
        match self {
            Command::Submit => HistoryAction::Submit,
            Command::Assign { .. } => HistoryAction::Assign,
            Command::SendBackToManager { .. } => HistoryAction::Review,
            Command::Approve { .. } => HistoryAction::Approve,
            Command::Reject { .. } => HistoryAction::Reject,
        }
    }

    fn message(&self) -> Option<String> {
        match self {
            Command::SendBackToManager { message }
            | Command::Approve { message }
            | Command::Reject { message } => message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_owned),
            Command::Submit | Command::Assign { .. } => None,
        }
    }
}

/// Create a request and its `create` history row, assigned to the first
/// IFDAMANAGER.
pub async fn create<S: WorkflowStore>(
    store: &mut S,
    actor: &Actor,
    new: NewRequest126,
) -> AppResult<CreatedRequest126> {
    let transition = transition_for(HistoryAction::Create);
    transition.check(WorkflowStatus::Nowhere, None, actor)?;

    if actor.role == Role::Qrp && !actor.belongs_to(new.company_id) {
        warn!(
            actor_id = actor.id,
            company_id = new.company_id,
            "QRP outside the company tried to create a request"
        );
        return Err(AppError::Forbidden(format!(
            "You are not a member of company {}",
            new.company_id
        )));
    }

    let manager = store
        .first_person_with_role(Role::IfdaManager)
        .await?
        .ok_or(WorkflowError::NoManagerAvailable)?;

    let request = store.insert_request(&new).await?;
    let history = store
        .append_history(&NewHistoryEntry {
            request_id: request.id,
            actor_id: actor.id,
            action: HistoryAction::Create,
            from_status: transition.from,
            to_status: transition.to,
            to_assignee_id: manager.id,
            message: None,
            ended: false,
        })
        .await?;

    info!(
        request_id = request.id,
        actor_id = actor.id,
        assignee_id = manager.id,
        "Request126 created"
    );
    Ok(CreatedRequest126 { request, history })
}

/// Apply `command` to request `request_id` on behalf of `actor`, appending
/// one history row. Nothing is written when any check fails.
pub async fn apply<S: WorkflowStore>(
    store: &mut S,
    actor: &Actor,
    request_id: i32,
    command: Command,
) -> AppResult<Request126History> {
    let action = command.action();
    let transition = transition_for(action);

    if !store.lock_request(request_id).await? {
        return Err(AppError::NotFound(format!("Request126 {request_id} not found")));
    }

    let latest = store
        .latest_history(request_id)
        .await?
        .ok_or(WorkflowError::MissingHistory { request_id })?;

    if let Err(err) = transition.check(latest.to_status, Some(latest.to_assignee_id), actor) {
        warn!(
            request_id,
            actor_id = actor.id,
            role = %actor.role,
            %action,
            status = %latest.to_status,
            "Workflow transition rejected: {err}"
        );
        return Err(err.into());
    }

    let to_assignee_id = match transition.assignee {
        AssigneeRule::Unchanged => latest.to_assignee_id,
        AssigneeRule::FirstManager => first_manager(store).await?,
        AssigneeRule::ChosenReviewer => {
            let Command::Assign { person_id } = &command else {
                return Err(AppError::Internal(format!(
                    "{action} has no assignee in its command"
                )));
            };
            chosen_reviewer(store, *person_id).await?
        }
        AssigneeRule::AssigningManager => match store.first_assign_actor(request_id).await? {
            Some(manager_id) => manager_id,
            None => first_manager(store).await?,
        },
    };

    let history = store
        .append_history(&NewHistoryEntry {
            request_id,
            actor_id: actor.id,
            action,
            from_status: latest.to_status,
            to_status: transition.to,
            to_assignee_id,
            message: command.message(),
            ended: transition.to.is_terminal(),
        })
        .await?;

    info!(
        request_id,
        actor_id = actor.id,
        %action,
        from = %history.from_status,
        to = %history.to_status,
        assignee_id = to_assignee_id,
        "Request126 transition applied"
    );
    Ok(history)
}

async fn first_manager<S: WorkflowStore>(store: &mut S) -> AppResult<i32> {
    let manager = store
        .first_person_with_role(Role::IfdaManager)
        .await?
        .ok_or(WorkflowError::NoManagerAvailable)?;
    Ok(manager.id)
}

async fn chosen_reviewer<S: WorkflowStore>(store: &mut S, person_id: i32) -> AppResult<i32> {
    let person = store
        .find_person(person_id)
        .await?
        .ok_or(WorkflowError::AssigneeNotFound { person_id })?;
    if person.role != Role::IfdaUser {
        return Err(WorkflowError::AssigneeNotReviewer {
            person_id,
            role: person.role,
        }
        .into());
    }
    Ok(person.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::memory::MemoryStore;

    const QRP: i32 = 1;
    const MANAGER: i32 = 2;
    const OTHER_MANAGER: i32 = 3;
    const REVIEWER: i32 = 4;
    const SYSTEM: i32 = 5;
    const CEO: i32 = 6;
    const COMPANY: i32 = 10;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::default();
        store.add_person(QRP, Role::Qrp);
        store.add_person(MANAGER, Role::IfdaManager);
        store.add_person(OTHER_MANAGER, Role::IfdaManager);
        store.add_person(REVIEWER, Role::IfdaUser);
        store.add_person(SYSTEM, Role::System);
        store.add_person(CEO, Role::Ceo);
        store
    }

    fn actor(id: i32, role: Role) -> Actor {
        Actor { id, role, company_ids: vec![COMPANY] }
    }

    fn new_request() -> NewRequest126 {
        NewRequest126 {
            request_type: "OEB assessment".into(),
            company_id: COMPANY,
            line_id: 20,
            drug_id: 30,
            oeb: Some(3),
            oel: None,
        }
    }

    async fn created(store: &mut MemoryStore) -> i32 {
        create(store, &actor(QRP, Role::Qrp), new_request())
            .await
            .unwrap()
            .request
            .id
    }

    async fn pending_decision(store: &mut MemoryStore) -> i32 {
        let id = created(store).await;
        apply(store, &actor(QRP, Role::Qrp), id, Command::Submit).await.unwrap();
        apply(
            store,
            &actor(OTHER_MANAGER, Role::IfdaManager),
            id,
            Command::Assign { person_id: REVIEWER },
        )
        .await
        .unwrap();
        apply(
            store,
            &actor(REVIEWER, Role::IfdaUser),
            id,
            Command::SendBackToManager { message: Some("looks fine".into()) },
        )
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn create_writes_one_history_row_to_first_manager() {
        let mut store = store();
        let created = create(&mut store, &actor(QRP, Role::Qrp), new_request())
            .await
            .unwrap();

        let history = store.history_of(created.request.id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::Create);
        assert_eq!(history[0].from_status, WorkflowStatus::Nowhere);
        assert_eq!(history[0].to_status, WorkflowStatus::Draft);
        assert_eq!(history[0].to_assignee_id, MANAGER);
        assert_eq!(store.role_of(history[0].to_assignee_id), Some(Role::IfdaManager));
    }

    #[tokio::test]
    async fn create_by_system_is_allowed() {
        let mut store = store();
        let created = create(&mut store, &actor(SYSTEM, Role::System), new_request()).await;
        assert!(created.is_ok());
    }

    #[tokio::test]
    async fn create_by_other_roles_is_rejected() {
        let mut store = store();
        for (id, role) in [(REVIEWER, Role::IfdaUser), (MANAGER, Role::IfdaManager), (CEO, Role::Ceo)] {
            let err = create(&mut store, &actor(id, role), new_request()).await.unwrap_err();
            assert!(matches!(
                err,
                AppError::Workflow(WorkflowError::RoleNotPermitted { .. })
            ));
        }
        assert_eq!(store.request_count(), 0);
        assert_eq!(store.history_count(), 0);
    }

    #[tokio::test]
    async fn create_by_qrp_outside_company_is_forbidden() {
        let mut store = store();
        let outsider = Actor { id: QRP, role: Role::Qrp, company_ids: vec![COMPANY + 1] };
        let err = create(&mut store, &outsider, new_request()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn create_without_manager_writes_nothing() {
        let mut store = MemoryStore::default();
        store.add_person(QRP, Role::Qrp);
        let err = create(&mut store, &actor(QRP, Role::Qrp), new_request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Workflow(WorkflowError::NoManagerAvailable)
        ));
        assert_eq!(store.request_count(), 0);
        assert_eq!(store.history_count(), 0);
    }

    #[tokio::test]
    async fn full_happy_path_ends_approved_with_five_rows() {
        let mut store = store();
        let id = created(&mut store).await;

        let submitted = apply(&mut store, &actor(QRP, Role::Qrp), id, Command::Submit)
            .await
            .unwrap();
        assert_eq!(submitted.from_status, WorkflowStatus::Draft);
        assert_eq!(submitted.to_status, WorkflowStatus::PendingAssign);
        assert_eq!(submitted.to_assignee_id, MANAGER);

        let assigned = apply(
            &mut store,
            &actor(OTHER_MANAGER, Role::IfdaManager),
            id,
            Command::Assign { person_id: REVIEWER },
        )
        .await
        .unwrap();
        assert_eq!(assigned.from_status, WorkflowStatus::PendingAssign);
        assert_eq!(assigned.to_status, WorkflowStatus::PendingReview);
        assert_eq!(assigned.to_assignee_id, REVIEWER);

        let reviewed = apply(
            &mut store,
            &actor(REVIEWER, Role::IfdaUser),
            id,
            Command::SendBackToManager { message: Some("ok".into()) },
        )
        .await
        .unwrap();
        assert_eq!(reviewed.from_status, WorkflowStatus::PendingReview);
        assert_eq!(reviewed.to_status, WorkflowStatus::PendingDecision);
        assert_eq!(reviewed.to_assignee_id, OTHER_MANAGER);
        assert_eq!(reviewed.message.as_deref(), Some("ok"));

        let approved = apply(
            &mut store,
            &actor(OTHER_MANAGER, Role::IfdaManager),
            id,
            Command::Approve { message: None },
        )
        .await
        .unwrap();
        assert_eq!(approved.from_status, WorkflowStatus::PendingDecision);
        assert_eq!(approved.to_status, WorkflowStatus::Approved);
        assert_eq!(approved.to_assignee_id, OTHER_MANAGER);
        assert!(approved.ended_at.is_some());

        let history = store.history_of(id);
        assert_eq!(history.len(), 5);
        assert_eq!(store.latest(id).unwrap().to_status, WorkflowStatus::Approved);
    }

    #[tokio::test]
    async fn reject_ends_rejected() {
        let mut store = store();
        let id = pending_decision(&mut store).await;
        let rejected = apply(
            &mut store,
            &actor(OTHER_MANAGER, Role::IfdaManager),
            id,
            Command::Reject { message: Some("  missing OEL data ".into()) },
        )
        .await
        .unwrap();
        assert_eq!(rejected.to_status, WorkflowStatus::Rejected);
        assert_eq!(rejected.message.as_deref(), Some("missing OEL data"));
        assert!(rejected.ended_at.is_some());
    }

    #[tokio::test]
    async fn draft_rejects_everything_but_submit_by_qrp() {
        let commands = [
            Command::Assign { person_id: REVIEWER },
            Command::SendBackToManager { message: None },
            Command::Approve { message: None },
            Command::Reject { message: None },
        ];
        let actors = [
            actor(QRP, Role::Qrp),
            actor(MANAGER, Role::IfdaManager),
            actor(REVIEWER, Role::IfdaUser),
            actor(SYSTEM, Role::System),
            actor(CEO, Role::Ceo),
        ];

        let mut store = store();
        let id = created(&mut store).await;

        for command in &commands {
            for who in &actors {
                let before = store.history_count();
                let result = apply(&mut store, who, id, command.clone()).await;
                assert!(result.is_err(), "{:?} by {} should fail", command, who.role);
                assert_eq!(store.history_count(), before);
            }
        }
        for who in actors.iter().filter(|a| a.role != Role::Qrp) {
            let before = store.history_count();
            assert!(apply(&mut store, who, id, Command::Submit).await.is_err());
            assert_eq!(store.history_count(), before);
        }

        assert!(apply(&mut store, &actor(QRP, Role::Qrp), id, Command::Submit)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn assign_rejects_non_reviewer_and_leaves_history() {
        let mut store = store();
        let id = created(&mut store).await;
        apply(&mut store, &actor(QRP, Role::Qrp), id, Command::Submit).await.unwrap();
        let before = store.history_count();

        let err = apply(
            &mut store,
            &actor(MANAGER, Role::IfdaManager),
            id,
            Command::Assign { person_id: OTHER_MANAGER },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::Workflow(WorkflowError::AssigneeNotReviewer { person_id: OTHER_MANAGER, .. })
        ));

        let err = apply(
            &mut store,
            &actor(MANAGER, Role::IfdaManager),
            id,
            Command::Assign { person_id: 404 },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::Workflow(WorkflowError::AssigneeNotFound { person_id: 404 })
        ));

        assert_eq!(store.history_count(), before);
        assert_eq!(store.latest(id).unwrap().to_status, WorkflowStatus::PendingAssign);
    }

    #[tokio::test]
    async fn assign_sets_latest_assignee_to_reviewer() {
        let mut store = store();
        let id = created(&mut store).await;
        apply(&mut store, &actor(QRP, Role::Qrp), id, Command::Submit).await.unwrap();
        apply(
            &mut store,
            &actor(SYSTEM, Role::System),
            id,
            Command::Assign { person_id: REVIEWER },
        )
        .await
        .unwrap();

        let latest = store.latest(id).unwrap();
        assert_eq!(latest.to_assignee_id, REVIEWER);
        assert_eq!(store.role_of(latest.to_assignee_id), Some(Role::IfdaUser));
    }

    #[tokio::test]
    async fn send_back_requires_the_assigned_reviewer() {
        let mut store = MemoryStore::default();
        store.add_person(QRP, Role::Qrp);
        store.add_person(MANAGER, Role::IfdaManager);
        store.add_person(REVIEWER, Role::IfdaUser);
        store.add_person(7, Role::IfdaUser);

        let id = created(&mut store).await;
        apply(&mut store, &actor(QRP, Role::Qrp), id, Command::Submit).await.unwrap();
        apply(
            &mut store,
            &actor(MANAGER, Role::IfdaManager),
            id,
            Command::Assign { person_id: REVIEWER },
        )
        .await
        .unwrap();

        let before = store.history_count();
        let err = apply(
            &mut store,
            &actor(7, Role::IfdaUser),
            id,
            Command::SendBackToManager { message: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::Workflow(WorkflowError::NotCurrentAssignee { action: HistoryAction::Review })
        ));
        assert_eq!(store.history_count(), before);
    }

    #[tokio::test]
    async fn send_back_falls_back_to_first_manager_without_assign_row() {
        let mut store = store();
        let id = created(&mut store).await;
        store.push_history(NewHistoryEntry {
            request_id: id,
            actor_id: SYSTEM,
            action: HistoryAction::Submit,
            from_status: WorkflowStatus::Draft,
            to_status: WorkflowStatus::PendingReview,
            to_assignee_id: REVIEWER,
            message: None,
            ended: false,
        });

        let reviewed = apply(
            &mut store,
            &actor(REVIEWER, Role::IfdaUser),
            id,
            Command::SendBackToManager { message: None },
        )
        .await
        .unwrap();
        assert_eq!(reviewed.to_assignee_id, MANAGER);
    }

    #[tokio::test]
    async fn approve_by_non_assignee_manager_fails() {
        let mut store = store();
        let id = pending_decision(&mut store).await;
        assert_eq!(store.latest(id).unwrap().to_status, WorkflowStatus::PendingDecision);
        let before = store.history_count();

        let err = apply(
            &mut store,
            &actor(MANAGER, Role::IfdaManager),
            id,
            Command::Approve { message: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::Workflow(WorkflowError::NotCurrentAssignee { action: HistoryAction::Approve })
        ));
        assert_eq!(store.history_count(), before);
        assert_eq!(store.latest(id).unwrap().to_status, WorkflowStatus::PendingDecision);
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let mut store = store();
        let err = apply(&mut store, &actor(QRP, Role::Qrp), 999, Command::Submit)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn request_without_history_is_a_client_error() {
        let mut store = store();
        let id = store.insert_bare_request(new_request());
        let err = apply(&mut store, &actor(QRP, Role::Qrp), id, Command::Submit)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Workflow(WorkflowError::MissingHistory { .. })
        ));
    }

    #[test]
    fn blank_messages_are_dropped() {
        assert_eq!(Command::Approve { message: Some("   ".into()) }.message(), None);
        assert_eq!(Command::Submit.message(), None);
        assert_eq!(
            Command::SendBackToManager { message: Some("x".into()) }.message(),
            Some("x".to_string())
        );
    }
}
