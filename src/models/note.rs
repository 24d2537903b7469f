use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A note joined with its author's display name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNoteRequest {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNoteRequest {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NoteStats {
    pub total_notes: i64,
    pub notes_created: i64,
    pub tasks_with_notes: i64,
    pub notes_this_week: i64,
    pub notes_this_month: i64,
}
