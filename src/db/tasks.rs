use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::activity;
use crate::models::{ActivityKind, NewTask, Priority, Task, TaskStats, TaskStatus, UpdateTaskRequest};

const TASK_SELECT: &str = "SELECT \
    t.id, t.user_id, t.title, t.description, t.due_date, t.priority, t.status, \
    t.category_id, t.reminder_minutes, t.created_at, t.updated_at, \
    c.name AS category_name, c.color AS category_color \
    FROM tasks t \
    LEFT JOIN categories c ON t.category_id = c.id";

pub async fn fetch_tasks(db: &SqlitePool, user_id: &str) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "{TASK_SELECT} WHERE t.user_id = ? ORDER BY t.created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn find_task(
    db: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "{TASK_SELECT} WHERE t.id = ? AND t.user_id = ?"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn insert_task(
    db: &SqlitePool,
    req: NewTask,
    user_id: &str,
) -> Result<Task, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO tasks \
            (id, user_id, title, description, due_date, priority, status, \
            category_id, reminder_minutes, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.due_date)
    .bind(req.priority)
    .bind(req.status)
    .bind(&req.category_id)
    .bind(req.reminder_minutes)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    activity::log(
        db,
        &id,
        user_id,
        ActivityKind::Created,
        &format!("Task \"{}\" was created", req.title),
    )
    .await;

    find_task(db, &id, user_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Merges the provided fields over the current row. Enum-valued fields are
/// parsed by the caller before this runs.
pub async fn update_task(
    db: &SqlitePool,
    id: &str,
    user_id: &str,
    req: UpdateTaskRequest,
    priority: Option<Priority>,
    status: Option<TaskStatus>,
) -> Result<Option<Task>, sqlx::Error> {
    let Some(mut current) = find_task(db, id, user_id).await? else {
        return Ok(None);
    };

    if let Some(title) = req.title {
        current.title = title;
    }
    if let Some(description) = req.description {
        current.description = Some(description);
    }
    if let Some(due_date) = req.due_date {
        current.due_date = Some(due_date);
    }
    if let Some(priority) = priority {
        current.priority = priority;
    }
    if let Some(status) = status {
        current.status = status;
    }
    if let Some(category_id) = req.category_id {
        current.category_id = Some(category_id);
    }
    if let Some(reminder_minutes) = req.reminder_minutes {
        current.reminder_minutes = reminder_minutes;
    }
    let now = Utc::now().to_rfc3339();
    current.updated_at = now.clone();

    sqlx::query(
        "UPDATE tasks \
         SET title = ?, description = ?, due_date = ?, priority = ?, status = ?, \
             category_id = ?, reminder_minutes = ?, updated_at = ? \
         WHERE id = ? AND user_id = ?",
    )
    .bind(&current.title)
    .bind(&current.description)
    .bind(&current.due_date)
    .bind(current.priority)
    .bind(current.status)
    .bind(&current.category_id)
    .bind(current.reminder_minutes)
    .bind(&now)
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;

    activity::log(
        db,
        id,
        user_id,
        ActivityKind::Updated,
        &format!("Task \"{}\" was updated", current.title),
    )
    .await;

    find_task(db, id, user_id).await
}

/// Removes a task and its dependents (checklist items, notes, tag
/// associations) in one transaction.
pub async fn delete_task(
    db: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<Task>, sqlx::Error> {
    let Some(task) = find_task(db, id, user_id).await? else {
        return Ok(None);
    };

    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM checklist_items WHERE task_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM notes WHERE task_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM task_tags WHERE task_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    activity::log(
        db,
        id,
        user_id,
        ActivityKind::Deleted,
        &format!("Task \"{}\" was deleted", task.title),
    )
    .await;

    Ok(Some(task))
}

pub async fn complete_task(
    db: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<Task>, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let affected = sqlx::query(
        "UPDATE tasks SET status = 'done', updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(&now)
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }

    let task = find_task(db, id, user_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

    activity::log(
        db,
        id,
        user_id,
        ActivityKind::Completed,
        &format!("Task \"{}\" was marked as done", task.title),
    )
    .await;

    Ok(Some(task))
}

pub async fn fetch_by_category(
    db: &SqlitePool,
    category_id: &str,
    user_id: &str,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "{TASK_SELECT} WHERE t.category_id = ? AND t.user_id = ? ORDER BY t.created_at DESC"
    ))
    .bind(category_id)
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn fetch_by_status(
    db: &SqlitePool,
    status: TaskStatus,
    user_id: &str,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "{TASK_SELECT} WHERE t.status = ? AND t.user_id = ? ORDER BY t.created_at DESC"
    ))
    .bind(status)
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn fetch_by_priority(
    db: &SqlitePool,
    priority: Priority,
    user_id: &str,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "{TASK_SELECT} WHERE t.priority = ? AND t.user_id = ? \
         ORDER BY t.due_date ASC, t.created_at DESC"
    ))
    .bind(priority)
    .bind(user_id)
    .fetch_all(db)
    .await
}

/// Tasks due within `days` days. The cutoff is computed here rather than in
/// SQL so the window matches the application clock.
pub async fn fetch_upcoming(
    db: &SqlitePool,
    user_id: &str,
    days: i64,
) -> Result<Vec<Task>, sqlx::Error> {
    let limit_date = (Utc::now() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string();

    sqlx::query_as::<_, Task>(&format!(
        "{TASK_SELECT} \
         WHERE t.user_id = ? \
           AND t.status != 'done' \
           AND t.due_date IS NOT NULL \
           AND t.due_date <= ? \
         ORDER BY t.due_date ASC, t.priority DESC"
    ))
    .bind(user_id)
    .bind(&limit_date)
    .fetch_all(db)
    .await
}

/// Unscoped existence probe, for dependents whose routes carry no actor.
pub async fn task_exists(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<String> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;

    Ok(found.is_some())
}

pub async fn task_stats(db: &SqlitePool, user_id: &str) -> Result<TaskStats, sqlx::Error> {
    sqlx::query_as::<_, TaskStats>(
        "SELECT \
            COUNT(*) AS total, \
            COUNT(CASE WHEN status = 'pending' THEN 1 END) AS pending, \
            COUNT(CASE WHEN status = 'in_progress' THEN 1 END) AS in_progress, \
            COUNT(CASE WHEN status = 'done' THEN 1 END) AS done, \
            COUNT(CASE WHEN priority = 'high' AND status != 'done' THEN 1 END) AS high_priority, \
            COUNT(CASE WHEN due_date < date('now') AND status != 'done' THEN 1 END) AS overdue \
         FROM tasks \
         WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_user, setup_test_db};

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            due_date: None,
            priority: Priority::Medium,
            status: TaskStatus::Pending,
            category_id: None,
            reminder_minutes: 0,
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_scoped_by_owner() {
        let pool = setup_test_db().await;
        let alice = seed_user(&pool, "Alice", "alice@example.com").await;
        let bob = seed_user(&pool, "Bob", "bob@example.com").await;

        let task = insert_task(&pool, new_task("Write report"), &alice)
            .await
            .expect("Failed to insert task");
        assert_eq!(task.title, "Write report");
        assert_eq!(task.status, TaskStatus::Pending);

        let mine = fetch_tasks(&pool, &alice).await.expect("fetch failed");
        assert_eq!(mine.len(), 1);

        // Another user sees nothing, and a direct lookup misses too.
        let theirs = fetch_tasks(&pool, &bob).await.expect("fetch failed");
        assert!(theirs.is_empty());
        let missing = find_task(&pool, &task.id, &bob).await.expect("find failed");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn create_appends_activity_log_entry() {
        let pool = setup_test_db().await;
        let user = seed_user(&pool, "Alice", "alice@example.com").await;

        let task = insert_task(&pool, new_task("Buy milk"), &user)
            .await
            .expect("Failed to insert task");

        let entries = activity::fetch_recent(&pool, &user, 10)
            .await
            .expect("Failed to fetch activity");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].task_id, task.id);
        assert_eq!(entries[0].kind, ActivityKind::Created);
    }

    #[tokio::test]
    async fn complete_sets_done_and_logs() {
        let pool = setup_test_db().await;
        let user = seed_user(&pool, "Alice", "alice@example.com").await;

        let task = insert_task(&pool, new_task("Ship release"), &user)
            .await
            .expect("Failed to insert task");

        let completed = complete_task(&pool, &task.id, &user)
            .await
            .expect("Failed to complete task")
            .expect("Task not found");
        assert_eq!(completed.status, TaskStatus::Done);

        let entries = activity::fetch_recent(&pool, &user, 10)
            .await
            .expect("Failed to fetch activity");
        assert!(entries.iter().any(|e| e.kind == ActivityKind::Completed));

        // Completing a task owned by someone else reports not found.
        let other = seed_user(&pool, "Bob", "bob@example.com").await;
        let denied = complete_task(&pool, &task.id, &other)
            .await
            .expect("Failed to run complete");
        assert!(denied.is_none());
    }

    #[tokio::test]
    async fn delete_cascades_to_dependents() {
        let pool = setup_test_db().await;
        let user = seed_user(&pool, "Alice", "alice@example.com").await;

        let task = insert_task(&pool, new_task("Plan trip"), &user)
            .await
            .expect("Failed to insert task");

        crate::db::checklists::insert_item(&pool, &task.id, "Book flights", None)
            .await
            .expect("Failed to insert item");
        crate::db::notes::insert_note(&pool, &task.id, &user, "Remember passports")
            .await
            .expect("Failed to insert note");

        let deleted = delete_task(&pool, &task.id, &user)
            .await
            .expect("Failed to delete task")
            .expect("Task not found");
        assert_eq!(deleted.id, task.id);

        let items = crate::db::checklists::fetch_items(&pool, &task.id)
            .await
            .expect("Failed to fetch items");
        assert!(items.is_empty());
        let notes = crate::db::notes::fetch_for_task(&pool, &task.id)
            .await
            .expect("Failed to fetch notes");
        assert!(notes.is_empty());
        assert!(
            find_task(&pool, &task.id, &user)
                .await
                .expect("find failed")
                .is_none()
        );
    }

    #[tokio::test]
    async fn stats_count_by_status_and_priority() {
        let pool = setup_test_db().await;
        let user = seed_user(&pool, "Alice", "alice@example.com").await;

        insert_task(&pool, new_task("a"), &user).await.unwrap();
        let mut urgent = new_task("b");
        urgent.priority = Priority::High;
        insert_task(&pool, urgent, &user).await.unwrap();
        let done = insert_task(&pool, new_task("c"), &user).await.unwrap();
        let _ = complete_task(&pool, &done.id, &user).await.unwrap();

        let stats = task_stats(&pool, &user).await.expect("stats failed");
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.high_priority, 1);
        assert_eq!(stats.overdue, 0);
    }

    #[tokio::test]
    async fn upcoming_filters_by_window() {
        let pool = setup_test_db().await;
        let user = seed_user(&pool, "Alice", "alice@example.com").await;

        let mut soon = new_task("due soon");
        soon.due_date = Some(
            (Utc::now() + Duration::days(2))
                .format("%Y-%m-%d")
                .to_string(),
        );
        insert_task(&pool, soon, &user).await.unwrap();

        let mut far = new_task("due later");
        far.due_date = Some(
            (Utc::now() + Duration::days(30))
                .format("%Y-%m-%d")
                .to_string(),
        );
        insert_task(&pool, far, &user).await.unwrap();

        insert_task(&pool, new_task("no due date"), &user)
            .await
            .unwrap();

        let upcoming = fetch_upcoming(&pool, &user, 7).await.expect("upcoming failed");
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].title, "due soon");
    }
}
