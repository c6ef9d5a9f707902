use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::db::models::person::{Person, Role};
use crate::db::models::request126::{
    HistoryAction, NewHistoryEntry, NewRequest126, Request126, Request126History,
};

use super::store::WorkflowStore;

/// In-memory [`WorkflowStore`] for engine tests. Every write gets a strictly
/// increasing timestamp so "latest" is unambiguous.
#[derive(Default)]
pub struct MemoryStore {
    persons: Vec<Person>,
    requests: Vec<Request126>,
    history: Vec<Request126History>,
    ticks: i64,
}

impl MemoryStore {
    pub fn add_person(&mut self, id: i32, role: Role) {
        let created_at = self.tick();
        self.persons.push(Person {
            id,
            name: format!("person-{id}"),
            email: None,
            role,
            created_at,
        });
    }

    pub fn role_of(&self, person_id: i32) -> Option<Role> {
        self.persons.iter().find(|p| p.id == person_id).map(|p| p.role)
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn history_count(&self) -> usize {
        self.history.len()
    }

    pub fn history_of(&self, request_id: i32) -> Vec<Request126History> {
        self.history
            .iter()
            .filter(|h| h.request_id == request_id)
            .cloned()
            .collect()
    }

    pub fn latest(&self, request_id: i32) -> Option<Request126History> {
        self.history
            .iter()
            .filter(|h| h.request_id == request_id)
            .max_by_key(|h| (h.created_at, h.id))
            .cloned()
    }

    /// Insert a request with no history row at all.
    pub fn insert_bare_request(&mut self, new: NewRequest126) -> i32 {
        self.push_request(&new).id
    }

    /// Append a history row without any workflow checks.
    pub fn push_history(&mut self, entry: NewHistoryEntry) -> Request126History {
        let created_at = self.tick();
        let row = Request126History {
            id: self.history.len() as i32 + 1,
            request_id: entry.request_id,
            actor_id: entry.actor_id,
            action: entry.action,
            from_status: entry.from_status,
            to_status: entry.to_status,
            to_assignee_id: entry.to_assignee_id,
            message: entry.message,
            created_at,
            ended_at: entry.ended.then_some(created_at),
        };
        self.history.push(row.clone());
        row
    }

    fn push_request(&mut self, new: &NewRequest126) -> Request126 {
        let now = self.tick();
        let request = Request126 {
            id: self.requests.len() as i32 + 1,
            request_type: new.request_type.clone(),
            company_id: new.company_id,
            line_id: new.line_id,
            drug_id: new.drug_id,
            oeb: new.oeb,
            oel: new.oel.clone(),
            created_at: now,
            updated_at: now,
            closed_at: None,
        };
        self.requests.push(request.clone());
        request
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(self.ticks)
    }
}

impl WorkflowStore for MemoryStore {
    async fn lock_request(&mut self, request_id: i32) -> Result<bool, sqlx::Error> {
        Ok(self.requests.iter().any(|r| r.id == request_id))
    }

    async fn latest_history(
        &mut self,
        request_id: i32,
    ) -> Result<Option<Request126History>, sqlx::Error> {
        Ok(self.latest(request_id))
    }

    async fn first_assign_actor(&mut self, request_id: i32) -> Result<Option<i32>, sqlx::Error> {
        Ok(self
            .history
            .iter()
            .filter(|h| h.request_id == request_id && h.action == HistoryAction::Assign)
            .min_by_key(|h| (h.created_at, h.id))
            .map(|h| h.actor_id))
    }

    async fn find_person(&mut self, person_id: i32) -> Result<Option<Person>, sqlx::Error> {
        Ok(self.persons.iter().find(|p| p.id == person_id).cloned())
    }

    async fn first_person_with_role(&mut self, role: Role) -> Result<Option<Person>, sqlx::Error> {
        Ok(self
            .persons
            .iter()
            .filter(|p| p.role == role)
            .min_by_key(|p| p.id)
            .cloned())
    }

    async fn insert_request(&mut self, new: &NewRequest126) -> Result<Request126, sqlx::Error> {
        Ok(self.push_request(new))
    }

    async fn append_history(
        &mut self,
        entry: &NewHistoryEntry,
    ) -> Result<Request126History, sqlx::Error> {
        Ok(self.push_history(entry.clone()))
    }
}
