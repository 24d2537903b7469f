use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::models::{ActivityEntry, ActivityKind};

/// Appends an activity-log entry. Best effort: a failed write is logged and
/// swallowed so it never fails the operation that triggered it.
pub async fn log(
    db: &SqlitePool,
    task_id: &str,
    user_id: &str,
    kind: ActivityKind,
    description: &str,
) {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO activity_log (id, task_id, user_id, kind, description, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(task_id)
    .bind(user_id)
    .bind(kind)
    .bind(description)
    .bind(&now)
    .execute(db)
    .await;

    if let Err(err) = result {
        warn!("failed to record activity log entry: {}", err);
    }
}

pub async fn fetch_recent(
    db: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<ActivityEntry>, sqlx::Error> {
    sqlx::query_as::<_, ActivityEntry>(
        "SELECT id, task_id, user_id, kind, description, created_at \
         FROM activity_log \
         WHERE user_id = ? \
         ORDER BY created_at DESC \
         LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await
}
