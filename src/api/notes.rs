use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use crate::api::{ApiResponse, CurrentUser};
use crate::db;
use crate::error::AppError;
use crate::models::{NewNoteRequest, Note, NoteStats, UpdateNoteRequest};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tasks/{id}/notes",
            get(list_for_task).post(create_note).delete(delete_all_notes),
        )
        .route("/notes", get(list_for_user))
        .route("/notes/recent", get(recent))
        .route("/notes/search", get(search))
        .route("/notes/stats", get(stats))
        .route(
            "/notes/{id}",
            get(get_note).put(update_note).delete(delete_note),
        )
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

async fn list_for_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Note>>>, AppError> {
    let notes = db::notes::fetch_for_task(&state.db, &task_id).await?;
    Ok(Json(ApiResponse::list(notes)))
}

async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Note>>, AppError> {
    let note = db::notes::find_note(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::data(note)))
}

async fn create_note(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(task_id): Path<String>,
    Json(req): Json<NewNoteRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Note>>), AppError> {
    let content = req.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(AppError::validation("note content is required"));
    }
    if !db::tasks::task_exists(&state.db, &task_id).await? {
        return Err(AppError::NotFound);
    }

    let note = db::notes::insert_note(&state.db, &task_id, &user_id, content).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(note, "note created")),
    ))
}

async fn update_note(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateNoteRequest>,
) -> Result<Json<ApiResponse<Note>>, AppError> {
    let content = req.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(AppError::validation("note content cannot be empty"));
    }

    let note = db::notes::update_note(&state.db, &id, &user_id, content)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(note, "note updated")))
}

async fn delete_note(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Note>>, AppError> {
    let note = db::notes::delete_note(&state.db, &id, &user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(note, "note deleted")))
}

async fn list_for_user(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<LimitParams>,
) -> Result<Json<ApiResponse<Vec<Note>>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let notes = db::notes::fetch_for_user(&state.db, &user_id, limit).await?;
    Ok(Json(ApiResponse::list(notes)))
}

async fn recent(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<LimitParams>,
) -> Result<Json<ApiResponse<Vec<Note>>>, AppError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let notes = db::notes::fetch_for_user(&state.db, &user_id, limit).await?;
    Ok(Json(ApiResponse::list(notes)))
}

async fn search(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Vec<Note>>>, AppError> {
    let term = params.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(AppError::validation("search term is required"));
    }

    let notes = db::notes::search(&state.db, &user_id, term).await?;
    Ok(Json(ApiResponse::list(notes)))
}

async fn stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<NoteStats>>, AppError> {
    let stats = db::notes::user_stats(&state.db, &user_id).await?;
    Ok(Json(ApiResponse::data(stats)))
}

async fn delete_all_notes(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let deleted = db::notes::delete_all_for_task(&state.db, &task_id).await?;
    Ok(Json(ApiResponse {
        success: true,
        data: None,
        message: Some(format!("{deleted} notes removed")),
        count: Some(deleted as usize),
    }))
}
