use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use crate::api::{ApiResponse, CurrentUser, valid_color};
use crate::db;
use crate::error::AppError;
use crate::models::{Category, CategoryStats, NewCategoryRequest, UpdateCategoryRequest};
use crate::state::AppState;

const DEFAULT_COLOR: &str = "#8B3DFF";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/most-used", get(most_used))
        .route("/categories/search", get(search))
        .route("/categories/stats", get(stats))
        .route("/categories/colors", get(colors))
        .route(
            "/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
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

async fn list_categories(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<Vec<Category>>>, AppError> {
    let categories = db::categories::fetch_categories(&state.db, &user_id).await?;
    Ok(Json(ApiResponse::list(categories)))
}

async fn get_category(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Category>>, AppError> {
    let category = db::categories::find_category(&state.db, &id, &user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::data(category)))
}

async fn create_category(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<NewCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>), AppError> {
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::validation("category name is required"));
    }
    let color = match req.color {
        None => DEFAULT_COLOR.to_string(),
        Some(color) if valid_color(&color) => color,
        Some(_) => {
            return Err(AppError::validation(
                "color must be a 6-digit hex value like #8B3DFF",
            ));
        }
    };

    let category = db::categories::insert_category(&state.db, name, &color, &user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(category, "category created")),
    ))
}

async fn update_category(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<ApiResponse<Category>>, AppError> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("category name cannot be empty"));
        }
    }
    if let Some(color) = &req.color {
        if !valid_color(color) {
            return Err(AppError::validation(
                "color must be a 6-digit hex value like #8B3DFF",
            ));
        }
    }

    let category = db::categories::update_category(&state.db, &id, &user_id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(category, "category updated")))
}

async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Category>>, AppError> {
    let category = db::categories::delete_category(&state.db, &id, &user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(category, "category deleted")))
}

async fn most_used(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<LimitParams>,
) -> Result<Json<ApiResponse<Vec<Category>>>, AppError> {
    let limit = params.limit.unwrap_or(5).clamp(1, 100);
    let categories = db::categories::most_used(&state.db, &user_id, limit).await?;
    Ok(Json(ApiResponse::list(categories)))
}

async fn search(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Vec<Category>>>, AppError> {
    let term = params.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(AppError::validation("search term is required"));
    }

    let categories = db::categories::search(&state.db, &user_id, term).await?;
    Ok(Json(ApiResponse::list(categories)))
}

async fn stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<CategoryStats>>, AppError> {
    let stats = db::categories::category_stats(&state.db, &user_id).await?;
    Ok(Json(ApiResponse::data(stats)))
}

async fn colors() -> Json<ApiResponse<Vec<String>>> {
    let palette: Vec<String> = db::categories::SUGGESTED_COLORS
        .iter()
        .map(|color| color.to_string())
        .collect();
    Json(ApiResponse::list(palette))
}
