use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::models::person::{Person, Role};
use crate::db::models::request126::{
    NewHistoryEntry, NewRequest126, Request126, Request126History,
};

/// Reads and writes one workflow transition needs.
///
/// Implementations are expected to run every call of a transition inside the
/// same database transaction.
#[allow(async_fn_in_trait)]
pub trait WorkflowStore {
    /// Lock the request row for the rest of the transaction. `false` if it
    /// does not exist.
    async fn lock_request(&mut self, request_id: i32) -> Result<bool, sqlx::Error>;

    async fn latest_history(
        &mut self,
        request_id: i32,
    ) -> Result<Option<Request126History>, sqlx::Error>;

    /// Actor of the oldest `assign` row of the request.
    async fn first_assign_actor(&mut self, request_id: i32) -> Result<Option<i32>, sqlx::Error>;

    async fn find_person(&mut self, person_id: i32) -> Result<Option<Person>, sqlx::Error>;

    /// Lowest-id person holding `role`.
    async fn first_person_with_role(&mut self, role: Role) -> Result<Option<Person>, sqlx::Error>;

    async fn insert_request(&mut self, new: &NewRequest126) -> Result<Request126, sqlx::Error>;

    async fn append_history(
        &mut self,
        entry: &NewHistoryEntry,
    ) -> Result<Request126History, sqlx::Error>;
}

pub(crate) const HISTORY_COLUMNS: &str = "id, request_id, actor_id, action, from_status, to_status, \
     to_assignee_id, message, created_at, ended_at";

pub(crate) const REQUEST_COLUMNS: &str = "id, request_type, company_id, line_id, drug_id, oeb, oel, \
     created_at, updated_at, closed_at";

const PERSON_COLUMNS: &str = "id, name, email, role, created_at";

/// [`WorkflowStore`] over one open PostgreSQL transaction. Dropping it
/// without [`commit`](PgWorkflowStore::commit) rolls everything back.
pub struct PgWorkflowStore {
    tx: Transaction<'static, Postgres>,
}

impl PgWorkflowStore {
    pub async fn begin(pool: &PgPool) -> Result<Self, sqlx::Error> {
        Ok(Self { tx: pool.begin().await? })
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}

impl WorkflowStore for PgWorkflowStore {
    async fn lock_request(&mut self, request_id: i32) -> Result<bool, sqlx::Error> {
        let locked: Option<i32> =
            sqlx::query_scalar("SELECT id FROM request126 WHERE id = $1 FOR UPDATE")
                .bind(request_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(locked.is_some())
    }

    async fn latest_history(
        &mut self,
        request_id: i32,
    ) -> Result<Option<Request126History>, sqlx::Error> {
        sqlx::query_as::<_, Request126History>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM request126_history
             WHERE request_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(request_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn first_assign_actor(&mut self, request_id: i32) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT actor_id FROM request126_history
             WHERE request_id = $1 AND action = 'assign'
             ORDER BY created_at ASC, id ASC
             LIMIT 1",
        )
        .bind(request_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn find_person(&mut self, person_id: i32) -> Result<Option<Person>, sqlx::Error> {
        sqlx::query_as::<_, Person>(&format!(
            "SELECT {PERSON_COLUMNS} FROM persons WHERE id = $1"
        ))
        .bind(person_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn first_person_with_role(&mut self, role: Role) -> Result<Option<Person>, sqlx::Error> {
        sqlx::query_as::<_, Person>(&format!(
            "SELECT {PERSON_COLUMNS} FROM persons WHERE role = $1 ORDER BY id LIMIT 1"
        ))
        .bind(role)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn insert_request(&mut self, new: &NewRequest126) -> Result<Request126, sqlx::Error> {
        sqlx::query_as::<_, Request126>(&format!(
            "INSERT INTO request126 (request_type, company_id, line_id, drug_id, oeb, oel)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(&new.request_type)
        .bind(new.company_id)
        .bind(new.line_id)
        .bind(new.drug_id)
        .bind(new.oeb)
        .bind(&new.oel)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn append_history(
        &mut self,
        entry: &NewHistoryEntry,
    ) -> Result<Request126History, sqlx::Error> {
        sqlx::query_as::<_, Request126History>(&format!(
            "INSERT INTO request126_history
                (request_id, actor_id, action, from_status, to_status, to_assignee_id, message, ended_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {HISTORY_COLUMNS}"
        ))
        .bind(entry.request_id)
        .bind(entry.actor_id)
        .bind(entry.action)
        .bind(entry.from_status)
        .bind(entry.to_status)
        .bind(entry.to_assignee_id)
        .bind(&entry.message)
        .bind(entry.ended.then(Utc::now))
        .fetch_one(&mut *self.tx)
        .await
    }
}
