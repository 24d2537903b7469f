use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{ChecklistItem, TaskChecklistStats, UpdateChecklistItemRequest, UserChecklistStats};

pub async fn fetch_items(
    db: &SqlitePool,
    task_id: &str,
) -> Result<Vec<ChecklistItem>, sqlx::Error> {
    sqlx::query_as::<_, ChecklistItem>(
        "SELECT id, task_id, content, completed, position, created_at \
         FROM checklist_items \
         WHERE task_id = ? \
         ORDER BY position ASC, created_at ASC",
    )
    .bind(task_id)
    .fetch_all(db)
    .await
}

pub async fn find_item(db: &SqlitePool, id: &str) -> Result<Option<ChecklistItem>, sqlx::Error> {
    sqlx::query_as::<_, ChecklistItem>(
        "SELECT id, task_id, content, completed, position, created_at \
         FROM checklist_items \
         WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Creates an item. Without an explicit position the item is appended after
/// the task's current highest position.
pub async fn insert_item(
    db: &SqlitePool,
    task_id: &str,
    content: &str,
    position: Option<i64>,
) -> Result<ChecklistItem, sqlx::Error> {
    let position = match position {
        Some(p) => p,
        None => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COALESCE(MAX(position), 0) + 1 FROM checklist_items WHERE task_id = ?",
            )
            .bind(task_id)
            .fetch_one(db)
            .await?
        }
    };

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO checklist_items (id, task_id, content, completed, position, created_at) \
         VALUES (?, ?, ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(task_id)
    .bind(content)
    .bind(position)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(ChecklistItem {
        id,
        task_id: task_id.to_string(),
        content: content.to_string(),
        completed: false,
        position,
        created_at: now,
    })
}

pub async fn update_item(
    db: &SqlitePool,
    id: &str,
    req: UpdateChecklistItemRequest,
) -> Result<Option<ChecklistItem>, sqlx::Error> {
    let Some(mut current) = find_item(db, id).await? else {
        return Ok(None);
    };

    if let Some(content) = req.content {
        current.content = content;
    }
    if let Some(completed) = req.completed {
        current.completed = completed;
    }
    if let Some(position) = req.position {
        current.position = position;
    }

    sqlx::query(
        "UPDATE checklist_items SET content = ?, completed = ?, position = ? WHERE id = ?",
    )
    .bind(&current.content)
    .bind(current.completed)
    .bind(current.position)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn toggle_item(
    db: &SqlitePool,
    id: &str,
    completed: bool,
) -> Result<Option<ChecklistItem>, sqlx::Error> {
    let affected = sqlx::query("UPDATE checklist_items SET completed = ? WHERE id = ?")
        .bind(completed)
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    if affected == 0 {
        return Ok(None);
    }

    find_item(db, id).await
}

pub async fn delete_item(db: &SqlitePool, id: &str) -> Result<Option<ChecklistItem>, sqlx::Error> {
    let Some(item) = find_item(db, id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM checklist_items WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    Ok(Some(item))
}

/// Re-sequences a task's checklist. Each id in `item_ids` is assigned its
/// 1-based position in the sequence; the whole batch commits atomically or
/// not at all (dropping the transaction on an early return rolls it back).
///
/// The input is not validated against the task's actual item set: an id that
/// does not belong to `task_id` updates zero rows and is silently ignored.
pub async fn reorder_items(
    db: &SqlitePool,
    task_id: &str,
    item_ids: &[String],
) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    for (index, item_id) in item_ids.iter().enumerate() {
        sqlx::query("UPDATE checklist_items SET position = ? WHERE id = ? AND task_id = ?")
            .bind((index + 1) as i64)
            .bind(item_id)
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn set_all_completed(
    db: &SqlitePool,
    task_id: &str,
    completed: bool,
) -> Result<u64, sqlx::Error> {
    let affected = sqlx::query("UPDATE checklist_items SET completed = ? WHERE task_id = ?")
        .bind(completed)
        .bind(task_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(affected)
}

pub async fn delete_all_for_task(db: &SqlitePool, task_id: &str) -> Result<u64, sqlx::Error> {
    let affected = sqlx::query("DELETE FROM checklist_items WHERE task_id = ?")
        .bind(task_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(affected)
}

pub async fn task_stats(
    db: &SqlitePool,
    task_id: &str,
) -> Result<TaskChecklistStats, sqlx::Error> {
    sqlx::query_as::<_, TaskChecklistStats>(
        "SELECT \
            COUNT(*) AS total_items, \
            COUNT(CASE WHEN completed = 1 THEN 1 END) AS completed_items, \
            COUNT(CASE WHEN completed = 0 THEN 1 END) AS pending_items, \
            CASE WHEN COUNT(*) = 0 THEN 0.0 \
                 ELSE ROUND(COUNT(CASE WHEN completed = 1 THEN 1 END) * 100.0 / COUNT(*), 2) \
            END AS completion_percentage \
         FROM checklist_items \
         WHERE task_id = ?",
    )
    .bind(task_id)
    .fetch_one(db)
    .await
}

pub async fn user_stats(
    db: &SqlitePool,
    user_id: &str,
) -> Result<UserChecklistStats, sqlx::Error> {
    sqlx::query_as::<_, UserChecklistStats>(
        "SELECT \
            COUNT(c.id) AS total_items, \
            COUNT(CASE WHEN c.completed = 1 THEN 1 END) AS completed_items, \
            COUNT(CASE WHEN c.completed = 0 THEN 1 END) AS pending_items, \
            COUNT(DISTINCT c.task_id) AS tasks_with_checklists, \
            CASE WHEN COUNT(c.id) = 0 THEN 0.0 \
                 ELSE ROUND(COUNT(CASE WHEN c.completed = 1 THEN 1 END) * 100.0 / COUNT(c.id), 2) \
            END AS completion_percentage \
         FROM checklist_items c \
         INNER JOIN tasks t ON c.task_id = t.id \
         WHERE t.user_id = ?",
    )
    .bind(user_id)
    .fetch_one(db)
    .await
}
