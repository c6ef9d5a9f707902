use axum::{extract::State, http::StatusCode};
use sqlx::{PgPool, QueryBuilder};

use crate::db::models::person::{Person, PersonFilter};
use crate::error::{AppError, AppResult};
use crate::utils::api_response::ApiResponse;
use crate::utils::extract::{AppPath, AppQuery};

pub async fn fetch_person(pool: &PgPool, person_id: i32) -> Result<Option<Person>, sqlx::Error> {
    sqlx::query_as::<_, Person>(
        "SELECT id, name, email, role, created_at FROM persons WHERE id = $1",
    )
    .bind(person_id)
    .fetch_optional(pool)
    .await
}

/// List persons, optionally narrowed to one role (e.g. IFDAUSERs to assign).
pub async fn get_persons(
    State(pool): State<PgPool>,
    AppQuery(filter): AppQuery<PersonFilter>,
) -> AppResult<ApiResponse<Vec<Person>>> {
    let mut query_builder =
        QueryBuilder::new("SELECT id, name, email, role, created_at FROM persons");
    if let Some(role) = filter.role {
        query_builder.push(" WHERE role = ").push_bind(role);
    }
    query_builder.push(" ORDER BY id");

    let persons = query_builder
        .build_query_as::<Person>()
        .fetch_all(&pool)
        .await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Persons retrieved successfully",
        persons,
    ))
}

pub async fn get_person(
    State(pool): State<PgPool>,
    AppPath(person_id): AppPath<i32>,
) -> AppResult<ApiResponse<Person>> {
    let person = fetch_person(&pool, person_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Person {person_id} not found")))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Person retrieved successfully",
        person,
    ))
}
