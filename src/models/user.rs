use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Public user representation. The password hash never leaves the db layer.
///
/// The `nome`/`senha` wire keys are kept for compatibility with existing
/// clients.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUserRequest {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub senha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    pub nome: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePasswordRequest {
    #[serde(rename = "novaSenha")]
    pub nova_senha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub senha: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserStats {
    pub total_tasks: i64,
    pub total_categories: i64,
    pub total_tags: i64,
    pub completed_tasks: i64,
    pub overdue_tasks: i64,
}
