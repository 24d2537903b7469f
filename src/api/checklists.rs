use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde_json::Value;
use tracing::error;

use crate::api::{ApiResponse, CurrentUser};
use crate::db;
use crate::error::AppError;
use crate::models::{
    ChecklistItem, NewChecklistItemRequest, TaskChecklistStats, UpdateChecklistItemRequest,
    UserChecklistStats,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tasks/{id}/checklist",
            get(list_items).post(create_item).delete(delete_all_items),
        )
        .route("/tasks/{id}/checklist/reorder", post(reorder))
        .route("/tasks/{id}/checklist/stats", get(task_stats))
        .route("/tasks/{id}/checklist/mark-all", patch(mark_all))
        .route("/checklist/stats", get(user_stats))
        .route(
            "/checklist/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/checklist/{id}/toggle", patch(toggle_item))
}

fn required_bool(body: &Value, field: &str) -> Result<bool, AppError> {
    body.get(field)
        .and_then(Value::as_bool)
        .ok_or_else(|| AppError::validation(format!("field \"{field}\" must be a boolean")))
}

async fn list_items(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ChecklistItem>>>, AppError> {
    let items = db::checklists::fetch_items(&state.db, &task_id).await?;
    Ok(Json(ApiResponse::list(items)))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ChecklistItem>>, AppError> {
    let item = db::checklists::find_item(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::data(item)))
}

async fn create_item(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(req): Json<NewChecklistItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ChecklistItem>>), AppError> {
    let content = req.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(AppError::validation("item content is required"));
    }
    if !db::tasks::task_exists(&state.db, &task_id).await? {
        return Err(AppError::NotFound);
    }

    let item = db::checklists::insert_item(&state.db, &task_id, content, req.position).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(item, "checklist item created")),
    ))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateChecklistItemRequest>,
) -> Result<Json<ApiResponse<ChecklistItem>>, AppError> {
    if let Some(content) = &req.content {
        if content.trim().is_empty() {
            return Err(AppError::validation("item content cannot be empty"));
        }
    }

    let item = db::checklists::update_item(&state.db, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(item, "checklist item updated")))
}

async fn toggle_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<ChecklistItem>>, AppError> {
    let completed = required_bool(&body, "completed")?;

    let item = db::checklists::toggle_item(&state.db, &id, completed)
        .await?
        .ok_or(AppError::NotFound)?;

    let message = if completed {
        "item marked as completed"
    } else {
        "item marked as pending"
    };
    Ok(Json(ApiResponse::with_message(item, message)))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ChecklistItem>>, AppError> {
    let item = db::checklists::delete_item(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(item, "checklist item deleted")))
}

/// Applies the caller's ordering. A reorder that fails mid-flight is rolled
/// back by the engine; it surfaces here as a plain request failure.
async fn reorder(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let items = body
        .get("itemsOrder")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AppError::validation("itemsOrder must be an array with the item ids in the new order")
        })?;

    let ids: Vec<String> = items
        .iter()
        .filter_map(|value| value.as_str().map(str::to_string))
        .collect();
    if ids.len() != items.len() {
        return Err(AppError::validation("itemsOrder must contain item ids"));
    }

    match db::checklists::reorder_items(&state.db, &task_id, &ids).await {
        Ok(()) => Ok(Json(ApiResponse::message("checklist reordered"))),
        Err(err) => {
            error!("failed to reorder checklist for task {}: {}", task_id, err);
            Err(AppError::validation("failed to reorder checklist items"))
        }
    }
}

async fn mark_all(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let completed = required_bool(&body, "completed")?;

    let updated = db::checklists::set_all_completed(&state.db, &task_id, completed).await?;
    let message = if completed {
        format!("{updated} items marked as completed")
    } else {
        format!("{updated} items marked as pending")
    };

    Ok(Json(ApiResponse {
        success: true,
        data: None,
        message: Some(message),
        count: Some(updated as usize),
    }))
}

async fn delete_all_items(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let deleted = db::checklists::delete_all_for_task(&state.db, &task_id).await?;
    Ok(Json(ApiResponse {
        success: true,
        data: None,
        message: Some(format!("{deleted} checklist items removed")),
        count: Some(deleted as usize),
    }))
}

async fn task_stats(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse<TaskChecklistStats>>, AppError> {
    let stats = db::checklists::task_stats(&state.db, &task_id).await?;
    Ok(Json(ApiResponse::data(stats)))
}

async fn user_stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<UserChecklistStats>>, AppError> {
    let stats = db::checklists::user_stats(&state.db, &user_id).await?;
    Ok(Json(ApiResponse::data(stats)))
}
