use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use serde::Deserialize;

use crate::api::{ApiResponse, CurrentUser};
use crate::db;
use crate::error::AppError;
use crate::models::{
    ActivityEntry, NewTask, NewTaskRequest, Priority, Task, TaskStats, TaskStatus,
    UpdateTaskRequest,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/stats", get(stats))
        .route("/tasks/upcoming", get(upcoming))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/complete", patch(complete_task))
        .route("/tasks/status/{status}", get(by_status))
        .route("/tasks/priority/{priority}", get(by_priority))
        .route("/tasks/category/{category_id}", get(by_category))
        .route("/activity", get(recent_activity))
}

#[derive(Deserialize)]
struct UpcomingParams {
    days: Option<i64>,
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

fn parse_priority(value: &str) -> Result<Priority, AppError> {
    Priority::parse(value)
        .ok_or_else(|| AppError::validation("priority must be one of: low, medium, high"))
}

fn parse_status(value: &str) -> Result<TaskStatus, AppError> {
    TaskStatus::parse(value).ok_or_else(|| {
        AppError::validation("status must be one of: pending, in_progress, done, cancelled")
    })
}

async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let tasks = db::tasks::fetch_tasks(&state.db, &user_id).await?;
    Ok(Json(ApiResponse::list(tasks)))
}

async fn get_task(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Task>>, AppError> {
    let task = db::tasks::find_task(&state.db, &id, &user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::data(task)))
}

async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<NewTaskRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), AppError> {
    let title = req.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }

    let priority = match req.priority.as_deref() {
        Some(value) => parse_priority(value)?,
        None => Priority::Medium,
    };
    let status = match req.status.as_deref() {
        Some(value) => parse_status(value)?,
        None => TaskStatus::Pending,
    };
    let reminder_minutes = req.reminder_minutes.unwrap_or(0);
    if reminder_minutes < 0 {
        return Err(AppError::validation("reminder_minutes must not be negative"));
    }

    let task = db::tasks::insert_task(
        &state.db,
        NewTask {
            title: title.to_string(),
            description: req.description,
            due_date: req.due_date,
            priority,
            status,
            category_id: req.category_id,
            reminder_minutes,
        },
        &user_id,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(task, "task created")),
    ))
}

async fn update_task(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<ApiResponse<Task>>, AppError> {
    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(AppError::validation("title cannot be empty"));
        }
    }
    let priority = req.priority.as_deref().map(parse_priority).transpose()?;
    let status = req.status.as_deref().map(parse_status).transpose()?;
    if let Some(minutes) = req.reminder_minutes {
        if minutes < 0 {
            return Err(AppError::validation("reminder_minutes must not be negative"));
        }
    }

    let task = db::tasks::update_task(&state.db, &id, &user_id, req, priority, status)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(task, "task updated")))
}

async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Task>>, AppError> {
    let task = db::tasks::delete_task(&state.db, &id, &user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(task, "task deleted")))
}

async fn complete_task(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Task>>, AppError> {
    let task = db::tasks::complete_task(&state.db, &id, &user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(task, "task marked as done")))
}

async fn by_status(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(status): Path<String>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let status = parse_status(&status)?;
    let tasks = db::tasks::fetch_by_status(&state.db, status, &user_id).await?;
    Ok(Json(ApiResponse::list(tasks)))
}

async fn by_priority(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(priority): Path<String>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let priority = parse_priority(&priority)?;
    let tasks = db::tasks::fetch_by_priority(&state.db, priority, &user_id).await?;
    Ok(Json(ApiResponse::list(tasks)))
}

async fn by_category(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(category_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let tasks = db::tasks::fetch_by_category(&state.db, &category_id, &user_id).await?;
    Ok(Json(ApiResponse::list(tasks)))
}

async fn upcoming(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<UpcomingParams>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let days = params.days.unwrap_or(7);
    if days < 0 {
        return Err(AppError::validation("days must not be negative"));
    }
    let tasks = db::tasks::fetch_upcoming(&state.db, &user_id, days).await?;
    Ok(Json(ApiResponse::list(tasks)))
}

async fn stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<TaskStats>>, AppError> {
    let stats = db::tasks::task_stats(&state.db, &user_id).await?;
    Ok(Json(ApiResponse::data(stats)))
}

async fn recent_activity(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<LimitParams>,
) -> Result<Json<ApiResponse<Vec<ActivityEntry>>>, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 200);
    let entries = db::activity::fetch_recent(&state.db, &user_id, limit).await?;
    Ok(Json(ApiResponse::list(entries)))
}
