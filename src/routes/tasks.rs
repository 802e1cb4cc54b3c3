use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::{AppError, AppResult};
use crate::events;
use crate::models::task::{DbTask, Task, TaskCreateRequest, TaskUpdateRequest};
use crate::utils::utc_now;

const TASK_COLUMNS: &str =
    "id, organization_id, created_by_id, title, description, category, status, created_at, updated_at, deleted_at";

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    responses((status = 200, description = "Tasks in the principal's accessible organizations", body = [Task]))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<Task>>> {
    let orgs = state.policy.accessible_organizations(&principal).await?;

    let placeholders = vec!["?"; orgs.len()].join(", ");
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks \
         WHERE organization_id IN ({placeholders}) AND deleted_at IS NULL \
         ORDER BY created_at DESC"
    );

    let mut query = sqlx::query_as::<_, DbTask>(&sql);
    for org in &orgs {
        query = query.bind(*org);
    }

    let rows = query.fetch_all(&state.pool).await?;
    let tasks: Vec<Task> = rows
        .into_iter()
        .map(Task::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(tasks))
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task detail", body = Task),
        (status = 403, description = "Task is outside the principal's accessible organizations"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    let task = fetch_visible_task(&state, &principal, id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    request_body = TaskCreateRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 403, description = "Viewers cannot create tasks")
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    if !state.policy.can_create(&principal) {
        return Err(AppError::forbidden(
            "You do not have permission to create tasks",
        ));
    }

    let task_id = Uuid::new_v4();
    let now = utc_now();

    // Organization and creator always come from the principal, never from
    // the request body.
    sqlx::query(
        "INSERT INTO tasks (id, organization_id, created_by_id, title, description, category, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(principal.organization_id)
    .bind(principal.user_id)
    .bind(&payload.title)
    .bind(payload.description.unwrap_or_default())
    .bind(payload.category.unwrap_or_else(|| "Work".to_string()))
    .bind(payload.status.unwrap_or_else(|| "To Do".to_string()))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let task = fetch_task(&state.pool, task_id).await?;
    events::log_activity(
        &state.event_bus,
        "created",
        Some(principal.user_id),
        &task,
        None,
    );

    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskUpdateRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 403, description = "Principal may not modify this task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskUpdateRequest>,
) -> AppResult<Json<Task>> {
    let old_task = fetch_visible_task(&state, &principal, id).await?;

    if !state.policy.can_modify(&principal, &old_task).await? {
        return Err(AppError::forbidden(
            "You do not have permission to modify this task",
        ));
    }

    let mut task = old_task.clone();

    let TaskUpdateRequest {
        title,
        description,
        category,
        status,
    } = payload;

    if let Some(title) = title {
        task.title = title;
    }
    if let Some(description) = description {
        task.description = description;
    }
    if let Some(category) = category {
        task.category = category;
    }
    if let Some(status) = status {
        task.status = status;
    }

    let now = utc_now();

    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, category = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.category)
    .bind(&task.status)
    .bind(now)
    .bind(task.id)
    .execute(&state.pool)
    .await?;

    let task = fetch_task(&state.pool, id).await?;
    events::log_activity(
        &state.event_bus,
        "updated",
        Some(principal.user_id),
        &task,
        Some(&old_task),
    );

    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task soft deleted"),
        (status = 403, description = "Principal may not delete this task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn delete_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let task = fetch_visible_task(&state, &principal, id).await?;

    if !state.policy.can_modify(&principal, &task).await? {
        return Err(AppError::forbidden(
            "You do not have permission to delete this task",
        ));
    }

    let now = utc_now();
    let affected = sqlx::query(
        "UPDATE tasks SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&state.pool)
    .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("task not found"));
    }

    events::log_activity(
        &state.event_bus,
        "deleted",
        Some(principal.user_id),
        &task,
        None,
    );

    Ok(StatusCode::NO_CONTENT)
}

/// 404 if the task does not exist, 403 if it exists outside the principal's
/// accessible organizations. Mutation handlers apply their own write gate on
/// top of this.
async fn fetch_visible_task(state: &AppState, principal: &Principal, id: Uuid) -> AppResult<Task> {
    let task = fetch_task(&state.pool, id).await?;

    if !state.policy.can_read(principal, &task).await? {
        return Err(AppError::forbidden("You do not have access to this task"));
    }

    Ok(task)
}

async fn fetch_task(pool: &SqlitePool, task_id: Uuid) -> AppResult<Task> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND deleted_at IS NULL");
    let row = sqlx::query_as::<_, DbTask>(&sql)
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(row.try_into()?),
        None => Err(AppError::not_found("task not found")),
    }
}
