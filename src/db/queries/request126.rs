use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::db::models::request126::{
    AssignPayload, CreatedRequest126, HistoryDetail, HistoryWithPeopleRow, MessagePayload,
    NewRequest126, Request126, Request126Detail, Request126Filter, Request126History,
    Request126Row, UpdateRequest126,
};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Actor;
use crate::utils::api_response::ApiResponse;
use crate::utils::extract::{AppJson, AppPath, AppQuery};
use crate::utils::pagination::{contains_pattern, PageRequest, Paginated};
use crate::workflow::store::REQUEST_COLUMNS;
use crate::workflow::{engine, Command, PgWorkflowStore};

/// Listings with at most this many items per page embed each item's history.
pub const DETAILED_PAGE_SIZE_LIMIT: u32 = 20;

const REQUEST_ROW_SELECT: &str = "SELECT r.id, r.request_type, r.company_id, c.name AS company_name, \
     r.line_id, l.name AS line_name, r.drug_id, d.name AS drug_name, r.oeb, r.oel, \
     r.created_at, r.updated_at, r.closed_at, h.to_status AS status, h.to_assignee_id AS assignee_id \
     FROM request126 r \
     JOIN companies c ON c.id = r.company_id \
     JOIN production_lines l ON l.id = r.line_id \
     JOIN drugs d ON d.id = r.drug_id \
     LEFT JOIN LATERAL ( \
         SELECT to_status, to_assignee_id FROM request126_history \
         WHERE request_id = r.id \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1 \
     ) h ON TRUE";

const REQUEST_COUNT_SELECT: &str = "SELECT COUNT(*) FROM request126 r \
     JOIN companies c ON c.id = r.company_id \
     JOIN production_lines l ON l.id = r.line_id \
     JOIN drugs d ON d.id = r.drug_id";

const HISTORY_WITH_PEOPLE_SELECT: &str = "SELECT h.id, h.request_id, h.actor_id, a.name AS actor_name, \
     a.role AS actor_role, h.action, h.from_status, h.to_status, h.to_assignee_id, \
     s.name AS assignee_name, s.role AS assignee_role, h.message, h.created_at, h.ended_at \
     FROM request126_history h \
     JOIN persons a ON a.id = h.actor_id \
     JOIN persons s ON s.id = h.to_assignee_id \
     WHERE h.request_id = ANY($1) \
     ORDER BY h.request_id, h.created_at ASC, h.id ASC";

//
// WORKFLOW ACTIONS
//

/// Create a request in `draft`, assigned to the first IFDAMANAGER.
pub async fn create_request126(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    AppJson(payload): AppJson<NewRequest126>,
) -> AppResult<ApiResponse<CreatedRequest126>> {
    let payload = validate_new_request(payload)?;

    let mut store = PgWorkflowStore::begin(&pool).await?;
    let created = engine::create(&mut store, &actor, payload).await?;
    store.commit().await?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Request created successfully",
        created,
    ))
}

pub async fn submit_request126(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    AppPath(request_id): AppPath<i32>,
) -> AppResult<ApiResponse<Request126History>> {
    run_transition(&pool, &actor, request_id, Command::Submit, "Request submitted").await
}

pub async fn assign_request126(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    AppPath(request_id): AppPath<i32>,
    AppJson(payload): AppJson<AssignPayload>,
) -> AppResult<ApiResponse<Request126History>> {
    let command = Command::Assign { person_id: payload.person_id };
    run_transition(&pool, &actor, request_id, command, "Request assigned").await
}

pub async fn send_back_request126(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    AppPath(request_id): AppPath<i32>,
    body: Bytes,
) -> AppResult<ApiResponse<Request126History>> {
    let payload: MessagePayload = optional_json(&body)?;
    let command = Command::SendBackToManager { message: payload.message };
    run_transition(&pool, &actor, request_id, command, "Request sent back to manager").await
}

pub async fn approve_request126(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    AppPath(request_id): AppPath<i32>,
    body: Bytes,
) -> AppResult<ApiResponse<Request126History>> {
    let payload: MessagePayload = optional_json(&body)?;
    let command = Command::Approve { message: payload.message };
    run_transition(&pool, &actor, request_id, command, "Request approved").await
}

pub async fn reject_request126(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    AppPath(request_id): AppPath<i32>,
    body: Bytes,
) -> AppResult<ApiResponse<Request126History>> {
    let payload: MessagePayload = optional_json(&body)?;
    let command = Command::Reject { message: payload.message };
    run_transition(&pool, &actor, request_id, command, "Request rejected").await
}

/// Run one transition in its own transaction. An error drops the store,
/// which rolls the transaction back.
async fn run_transition(
    pool: &PgPool,
    actor: &Actor,
    request_id: i32,
    command: Command,
    message: &'static str,
) -> AppResult<ApiResponse<Request126History>> {
    let mut store = PgWorkflowStore::begin(pool).await?;
    let history = engine::apply(&mut store, actor, request_id, command).await?;
    store.commit().await?;

    Ok(ApiResponse::success(StatusCode::OK, message, history))
}

//
// READ SIDE
//

/// Paginated, searchable listing. Closed requests are hidden unless
/// `includeClosed=true`.
pub async fn get_requests126(
    State(pool): State<PgPool>,
    AppQuery(filter): AppQuery<Request126Filter>,
) -> AppResult<ApiResponse<Paginated<Request126Detail>>> {
    let page = PageRequest::new(filter.page, filter.page_size);
    let pattern = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(contains_pattern);

    let mut count_query_builder = QueryBuilder::new(REQUEST_COUNT_SELECT);
    push_filters(&mut count_query_builder, filter.include_closed, pattern.as_deref());
    let total_items: i64 = count_query_builder
        .build_query_scalar::<i64>()
        .fetch_one(&pool)
        .await?;

    let mut query_builder = QueryBuilder::new(REQUEST_ROW_SELECT);
    push_filters(&mut query_builder, filter.include_closed, pattern.as_deref());
    query_builder
        .push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows = query_builder
        .build_query_as::<Request126Row>()
        .fetch_all(&pool)
        .await?;

    let items = if page.page_size <= DETAILED_PAGE_SIZE_LIMIT {
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut histories = fetch_histories(&pool, ids).await?;
        rows.into_iter()
            .map(|request| Request126Detail {
                history: Some(histories.remove(&request.id).unwrap_or_default()),
                request,
            })
            .collect()
    } else {
        rows.into_iter()
            .map(|request| Request126Detail { request, history: None })
            .collect()
    };

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Requests retrieved successfully",
        Paginated::new(items, total_items, page),
    ))
}

pub async fn get_request126(
    State(pool): State<PgPool>,
    AppPath(request_id): AppPath<i32>,
) -> AppResult<ApiResponse<Request126Detail>> {
    let request = fetch_request_row(&pool, request_id).await?;
    let mut histories = fetch_histories(&pool, vec![request_id]).await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request retrieved successfully",
        Request126Detail {
            history: Some(histories.remove(&request_id).unwrap_or_default()),
            request,
        },
    ))
}

pub async fn get_request126_history(
    State(pool): State<PgPool>,
    AppPath(request_id): AppPath<i32>,
) -> AppResult<ApiResponse<Vec<HistoryDetail>>> {
    fetch_request_row(&pool, request_id).await?;
    let mut histories = fetch_histories(&pool, vec![request_id]).await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request history retrieved successfully",
        histories.remove(&request_id).unwrap_or_default(),
    ))
}

//
// ADMINISTRATIVE OVERRIDES
//

/// Patch exposure values or open/close a request. History is untouched.
pub async fn update_request126(
    State(pool): State<PgPool>,
    AppPath(request_id): AppPath<i32>,
    AppJson(payload): AppJson<UpdateRequest126>,
) -> AppResult<ApiResponse<Request126>> {
    if payload.is_empty() {
        return Err(AppError::BadRequest("No fields provided for update".into()));
    }
    if let Some(oeb) = payload.oeb {
        validate_oeb(oeb)?;
    }

    let mut query_builder = QueryBuilder::<Postgres>::new("UPDATE request126 SET updated_at = NOW()");
    if let Some(oeb) = payload.oeb {
        query_builder.push(", oeb = ").push_bind(oeb);
    }
    if let Some(oel) = payload.oel {
        query_builder.push(", oel = ").push_bind(oel);
    }
    match payload.closed {
        Some(true) => {
            query_builder.push(", closed_at = COALESCE(closed_at, NOW())");
        }
        Some(false) => {
            query_builder.push(", closed_at = NULL");
        }
        None => {}
    }
    query_builder
        .push(" WHERE id = ")
        .push_bind(request_id)
        .push(format!(" RETURNING {REQUEST_COLUMNS}"));

    let updated = query_builder
        .build_query_as::<Request126>()
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Request126 {request_id} not found")))?;

    info!(request_id, "Request126 updated");
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request updated successfully",
        updated,
    ))
}

/// Hard delete. History rows cascade.
pub async fn delete_request126(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    AppPath(request_id): AppPath<i32>,
) -> AppResult<ApiResponse<i32>> {
    let result = sqlx::query("DELETE FROM request126 WHERE id = $1")
        .bind(request_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Request126 {request_id} not found")));
    }

    info!(request_id, actor_id = actor.id, "Request126 deleted");
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request deleted successfully",
        request_id,
    ))
}

//
// HELPERS
//

fn push_filters(
    query_builder: &mut QueryBuilder<'_, Postgres>,
    include_closed: bool,
    pattern: Option<&str>,
) {
    let mut has_conditions = false;

    if !include_closed {
        query_builder.push(" WHERE r.closed_at IS NULL");
        has_conditions = true;
    }

    if let Some(pattern) = pattern {
        query_builder.push(if has_conditions { " AND (" } else { " WHERE (" });
        query_builder
            .push("r.request_type ILIKE ")
            .push_bind(pattern.to_owned())
            .push(" OR c.name ILIKE ")
            .push_bind(pattern.to_owned())
            .push(" OR d.name ILIKE ")
            .push_bind(pattern.to_owned())
            .push(" OR l.name ILIKE ")
            .push_bind(pattern.to_owned())
            .push(")");
    }
}

async fn fetch_request_row(pool: &PgPool, request_id: i32) -> AppResult<Request126Row> {
    sqlx::query_as::<_, Request126Row>(&format!("{REQUEST_ROW_SELECT} WHERE r.id = $1"))
        .bind(request_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Request126 {request_id} not found")))
}

/// History of each request, oldest first, keyed by request id.
async fn fetch_histories(
    pool: &PgPool,
    request_ids: Vec<i32>,
) -> AppResult<HashMap<i32, Vec<HistoryDetail>>> {
    let mut grouped: HashMap<i32, Vec<HistoryDetail>> = HashMap::new();
    if request_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = sqlx::query_as::<_, HistoryWithPeopleRow>(HISTORY_WITH_PEOPLE_SELECT)
        .bind(request_ids)
        .fetch_all(pool)
        .await?;

    for row in rows {
        grouped.entry(row.request_id).or_default().push(row.into());
    }
    Ok(grouped)
}

fn validate_new_request(mut payload: NewRequest126) -> AppResult<NewRequest126> {
    payload.request_type = payload.request_type.trim().to_string();
    if payload.request_type.is_empty() {
        return Err(AppError::BadRequest("requestType must not be empty".into()));
    }
    if let Some(oeb) = payload.oeb {
        validate_oeb(oeb)?;
    }
    Ok(payload)
}

fn validate_oeb(oeb: i32) -> AppResult<()> {
    if !(1..=5).contains(&oeb) {
        return Err(AppError::BadRequest(format!(
            "oeb must be between 1 and 5, got {oeb}"
        )));
    }
    Ok(())
}

/// Parse an optional JSON body; an empty body yields the default value.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}
