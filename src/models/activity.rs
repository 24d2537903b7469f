use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    Updated,
    Completed,
    Deleted,
}

/// Append-only record of a task lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityEntry {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub kind: ActivityKind,
    pub description: String,
    pub created_at: String,
}
