use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{ApiResponse, CurrentUser, valid_color};
use crate::db;
use crate::error::AppError;
use crate::models::{NewTagRequest, Tag, TagStats, Task, UpdateTagRequest};
use crate::state::AppState;

const DEFAULT_COLOR: &str = "#8B3DFF";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/most-used", get(most_used))
        .route("/tags/search", get(search))
        .route("/tags/stats", get(stats))
        .route(
            "/tags/{id}",
            get(get_tag).put(update_tag).delete(delete_tag),
        )
        .route("/tags/{id}/tasks", get(tasks_with_tag))
        .route("/tasks/{id}/tags", get(tags_for_task).post(set_task_tags))
        .route("/tasks/{id}/tags/{tag_id}", delete(remove_tag_from_task))
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

fn validate_color(value: Option<String>) -> Result<String, AppError> {
    match value {
        None => Ok(DEFAULT_COLOR.to_string()),
        Some(color) if valid_color(&color) => Ok(color),
        Some(_) => Err(AppError::validation(
            "color must be a 6-digit hex value like #8B3DFF",
        )),
    }
}

async fn list_tags(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<Vec<Tag>>>, AppError> {
    let tags = db::tags::fetch_tags(&state.db, &user_id).await?;
    Ok(Json(ApiResponse::list(tags)))
}

async fn get_tag(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Tag>>, AppError> {
    let tag = db::tags::find_tag(&state.db, &id, &user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::data(tag)))
}

async fn create_tag(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<NewTagRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Tag>>), AppError> {
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::validation("tag name is required"));
    }
    let color = validate_color(req.color)?;

    let tag = db::tags::insert_tag(&state.db, name, &color, &user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(tag, "tag created")),
    ))
}

async fn update_tag(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTagRequest>,
) -> Result<Json<ApiResponse<Tag>>, AppError> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("tag name cannot be empty"));
        }
    }
    if let Some(color) = &req.color {
        if !valid_color(color) {
            return Err(AppError::validation(
                "color must be a 6-digit hex value like #8B3DFF",
            ));
        }
    }

    let tag = db::tags::update_tag(&state.db, &id, &user_id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(tag, "tag updated")))
}

async fn delete_tag(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Tag>>, AppError> {
    let tag = db::tags::delete_tag(&state.db, &id, &user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(tag, "tag deleted")))
}

async fn tags_for_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Tag>>>, AppError> {
    let tags = db::tags::fetch_for_task(&state.db, &task_id).await?;
    Ok(Json(ApiResponse::list(tags)))
}

/// Replaces the task's tag set wholesale with the ids in `tagIds`.
async fn set_task_tags(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let items = body
        .get("tagIds")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::validation("tagIds must be an array"))?;

    let tag_ids: Vec<String> = items
        .iter()
        .filter_map(|value| value.as_str().map(str::to_string))
        .collect();
    if tag_ids.len() != items.len() {
        return Err(AppError::validation("tagIds must contain tag ids"));
    }

    db::tags::replace_task_tags(&state.db, &task_id, &tag_ids).await?;
    Ok(Json(ApiResponse::message("tags associated with task")))
}

async fn remove_tag_from_task(
    State(state): State<AppState>,
    Path((task_id, tag_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let removed = db::tags::remove_from_task(&state.db, &task_id, &tag_id).await?;
    if !removed {
        return Err(AppError::NotFound);
    }
    Ok(Json(ApiResponse::message("tag removed from task")))
}

async fn tasks_with_tag(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(tag_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let tasks = db::tags::tasks_with_tag(&state.db, &tag_id, &user_id).await?;
    Ok(Json(ApiResponse::list(tasks)))
}

async fn most_used(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<LimitParams>,
) -> Result<Json<ApiResponse<Vec<Tag>>>, AppError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let tags = db::tags::most_used(&state.db, &user_id, limit).await?;
    Ok(Json(ApiResponse::list(tags)))
}

async fn search(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Vec<Tag>>>, AppError> {
    let term = params.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(AppError::validation("search term is required"));
    }

    let tags = db::tags::search(&state.db, &user_id, term).await?;
    Ok(Json(ApiResponse::list(tags)))
}

async fn stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<TagStats>>, AppError> {
    let stats = db::tags::tag_stats(&state.db, &user_id).await?;
    Ok(Json(ApiResponse::data(stats)))
}
