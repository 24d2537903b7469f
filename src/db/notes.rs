use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::{Note, NoteStats};

const NOTE_SELECT: &str = "SELECT \
    n.id, n.task_id, n.user_id, n.content, n.created_at, n.updated_at, \
    u.name AS author_name \
    FROM notes n \
    INNER JOIN users u ON n.user_id = u.id";

/// Author and task owner for a note, the two identities that matter for
/// mutation rights.
#[derive(Debug, FromRow)]
struct NoteAccess {
    author_id: String,
    owner_id: String,
}

async fn find_access(db: &SqlitePool, id: &str) -> Result<Option<NoteAccess>, sqlx::Error> {
    sqlx::query_as::<_, NoteAccess>(
        "SELECT n.user_id AS author_id, t.user_id AS owner_id \
         FROM notes n \
         INNER JOIN tasks t ON n.task_id = t.id \
         WHERE n.id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn fetch_for_task(db: &SqlitePool, task_id: &str) -> Result<Vec<Note>, sqlx::Error> {
    sqlx::query_as::<_, Note>(&format!(
        "{NOTE_SELECT} WHERE n.task_id = ? ORDER BY n.created_at DESC"
    ))
    .bind(task_id)
    .fetch_all(db)
    .await
}

pub async fn find_note(db: &SqlitePool, id: &str) -> Result<Option<Note>, sqlx::Error> {
    sqlx::query_as::<_, Note>(&format!("{NOTE_SELECT} WHERE n.id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_note(
    db: &SqlitePool,
    task_id: &str,
    user_id: &str,
    content: &str,
) -> Result<Note, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO notes (id, task_id, user_id, content, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(task_id)
    .bind(user_id)
    .bind(content)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    find_note(db, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Only the author may edit. A non-author caller gets `None`, the same
/// outcome as a missing note.
pub async fn update_note(
    db: &SqlitePool,
    id: &str,
    actor_id: &str,
    content: &str,
) -> Result<Option<Note>, sqlx::Error> {
    let Some(access) = find_access(db, id).await? else {
        return Ok(None);
    };
    if access.author_id != actor_id {
        return Ok(None);
    }

    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE notes SET content = ?, updated_at = ? WHERE id = ? AND user_id = ?")
        .bind(content)
        .bind(&now)
        .bind(id)
        .bind(actor_id)
        .execute(db)
        .await?;

    find_note(db, id).await
}

/// The author or the owner of the parent task may delete.
pub async fn delete_note(
    db: &SqlitePool,
    id: &str,
    actor_id: &str,
) -> Result<Option<Note>, sqlx::Error> {
    let Some(access) = find_access(db, id).await? else {
        return Ok(None);
    };
    if access.author_id != actor_id && access.owner_id != actor_id {
        return Ok(None);
    }

    let note = find_note(db, id).await?;

    sqlx::query("DELETE FROM notes WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    Ok(note)
}

/// Notes the user can see: authored by them or attached to their tasks.
pub async fn fetch_for_user(
    db: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Note>, sqlx::Error> {
    sqlx::query_as::<_, Note>(&format!(
        "{NOTE_SELECT} \
         INNER JOIN tasks t ON n.task_id = t.id \
         WHERE n.user_id = ? OR t.user_id = ? \
         ORDER BY n.created_at DESC \
         LIMIT ?"
    ))
    .bind(user_id)
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn search(
    db: &SqlitePool,
    user_id: &str,
    term: &str,
) -> Result<Vec<Note>, sqlx::Error> {
    sqlx::query_as::<_, Note>(&format!(
        "{NOTE_SELECT} \
         INNER JOIN tasks t ON n.task_id = t.id \
         WHERE (n.user_id = ? OR t.user_id = ?) AND n.content LIKE ? \
         ORDER BY n.created_at DESC"
    ))
    .bind(user_id)
    .bind(user_id)
    .bind(format!("%{}%", term))
    .fetch_all(db)
    .await
}

pub async fn user_stats(db: &SqlitePool, user_id: &str) -> Result<NoteStats, sqlx::Error> {
    sqlx::query_as::<_, NoteStats>(
        "SELECT \
            COUNT(n.id) AS total_notes, \
            COUNT(CASE WHEN n.user_id = ? THEN 1 END) AS notes_created, \
            COUNT(DISTINCT n.task_id) AS tasks_with_notes, \
            COUNT(CASE WHEN n.created_at >= date('now', '-7 days') THEN 1 END) AS notes_this_week, \
            COUNT(CASE WHEN n.created_at >= date('now', '-30 days') THEN 1 END) AS notes_this_month \
         FROM notes n \
         INNER JOIN tasks t ON n.task_id = t.id \
         WHERE n.user_id = ? OR t.user_id = ?",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_one(db)
    .await
}

pub async fn delete_all_for_task(db: &SqlitePool, task_id: &str) -> Result<u64, sqlx::Error> {
    let affected = sqlx::query("DELETE FROM notes WHERE task_id = ?")
        .bind(task_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(affected)
}
