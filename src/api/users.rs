use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};

use crate::api::ApiResponse;
use crate::db;
use crate::error::AppError;
use crate::models::{
    LoginRequest, NewUserRequest, UpdatePasswordRequest, UpdateUserRequest, User, UserStats,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/login", post(login))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/password", put(update_password))
        .route("/users/{id}/stats", get(stats))
}

async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<User>>>, AppError> {
    let users = db::users::fetch_users(&state.db).await?;
    Ok(Json(ApiResponse::list(users)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = db::users::find_user(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::data(user)))
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<NewUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), AppError> {
    let name = req.nome.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    let email = req.email.as_deref().map(str::trim).unwrap_or_default();
    if email.is_empty() {
        return Err(AppError::validation("email is required"));
    }
    let password = req.senha.as_deref().unwrap_or_default();
    if password.len() < 6 {
        return Err(AppError::validation(
            "password must be at least 6 characters",
        ));
    }

    let user = db::users::insert_user(&state.db, name, email, password).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(user, "user created")),
    ))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    if let Some(name) = &req.nome {
        if name.trim().is_empty() {
            return Err(AppError::validation("name cannot be empty"));
        }
    }
    if let Some(email) = &req.email {
        if email.trim().is_empty() {
            return Err(AppError::validation("email cannot be empty"));
        }
    }

    let user = db::users::update_user(&state.db, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(user, "user updated")))
}

async fn update_password(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let password = req.nova_senha.as_deref().unwrap_or_default();
    if password.len() < 6 {
        return Err(AppError::validation(
            "new password must be at least 6 characters",
        ));
    }

    let updated = db::users::update_password(&state.db, &id, password).await?;
    if !updated {
        return Err(AppError::NotFound);
    }
    Ok(Json(ApiResponse::message("password updated")))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = db::users::delete_user(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::with_message(user, "user deleted")))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let email = req.email.as_deref().map(str::trim).unwrap_or_default();
    let password = req.senha.as_deref().unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("email and password are required"));
    }

    let user = db::users::authenticate(&state.db, email, password)
        .await?
        .ok_or_else(|| AppError::validation("invalid email or password"))?;
    Ok(Json(ApiResponse::with_message(user, "login successful")))
}

async fn stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserStats>>, AppError> {
    let stats = db::users::user_stats(&state.db, &id).await?;
    Ok(Json(ApiResponse::data(stats)))
}
