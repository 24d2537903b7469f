use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChecklistItem {
    pub id: String,
    pub task_id: String,
    pub content: String,
    pub completed: bool,
    pub position: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewChecklistItemRequest {
    pub content: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateChecklistItemRequest {
    pub content: Option<String>,
    pub completed: Option<bool>,
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskChecklistStats {
    pub total_items: i64,
    pub completed_items: i64,
    pub pending_items: i64,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserChecklistStats {
    pub total_items: i64,
    pub completed_items: i64,
    pub pending_items: i64,
    pub tasks_with_checklists: i64,
    pub completion_percentage: f64,
}
