use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Tag, TagStats, Task, UpdateTagRequest};

const TAG_SELECT: &str = "SELECT \
    t.id, t.user_id, t.name, t.color, t.created_at, \
    (SELECT COUNT(*) FROM task_tags x WHERE x.tag_id = t.id) AS task_count \
    FROM tags t";

pub async fn fetch_tags(db: &SqlitePool, user_id: &str) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>(&format!(
        "{TAG_SELECT} WHERE t.user_id = ? ORDER BY t.name ASC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn find_tag(
    db: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>(&format!("{TAG_SELECT} WHERE t.id = ? AND t.user_id = ?"))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
}

pub async fn name_exists(
    db: &SqlitePool,
    name: &str,
    user_id: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let existing: Option<String> = match exclude_id {
        Some(exclude) => {
            sqlx::query_scalar("SELECT id FROM tags WHERE name = ? AND user_id = ? AND id != ?")
                .bind(name)
                .bind(user_id)
                .bind(exclude)
                .fetch_optional(db)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT id FROM tags WHERE name = ? AND user_id = ?")
                .bind(name)
                .bind(user_id)
                .fetch_optional(db)
                .await?
        }
    };

    Ok(existing.is_some())
}

pub async fn insert_tag(
    db: &SqlitePool,
    name: &str,
    color: &str,
    user_id: &str,
) -> Result<Tag, AppError> {
    if name_exists(db, name, user_id, None).await? {
        return Err(AppError::validation("a tag with this name already exists"));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query("INSERT INTO tags (id, user_id, name, color, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(user_id)
        .bind(name)
        .bind(color)
        .bind(&now)
        .execute(db)
        .await?;

    find_tag(db, &id, user_id)
        .await?
        .ok_or(AppError::Internal)
}

pub async fn update_tag(
    db: &SqlitePool,
    id: &str,
    user_id: &str,
    req: UpdateTagRequest,
) -> Result<Option<Tag>, AppError> {
    let Some(mut current) = find_tag(db, id, user_id).await? else {
        return Ok(None);
    };

    if let Some(name) = req.name {
        if name_exists(db, &name, user_id, Some(id)).await? {
            return Err(AppError::validation("a tag with this name already exists"));
        }
        current.name = name;
    }
    if let Some(color) = req.color {
        current.color = color;
    }

    sqlx::query("UPDATE tags SET name = ?, color = ? WHERE id = ? AND user_id = ?")
        .bind(&current.name)
        .bind(&current.color)
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(find_tag(db, id, user_id).await?)
}

pub async fn delete_tag(
    db: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<Tag>, sqlx::Error> {
    let Some(tag) = find_tag(db, id, user_id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM task_tags WHERE tag_id = ?")
        .bind(id)
        .execute(db)
        .await?;
    sqlx::query("DELETE FROM tags WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(Some(tag))
}

pub async fn fetch_for_task(db: &SqlitePool, task_id: &str) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>(&format!(
        "{TAG_SELECT} \
         INNER JOIN task_tags tt ON t.id = tt.tag_id \
         WHERE tt.task_id = ? \
         ORDER BY t.name ASC"
    ))
    .bind(task_id)
    .fetch_all(db)
    .await
}

/// Replace-all association write: the previous set is discarded entirely and
/// the new one inserted as a batch. An empty set leaves the task untagged.
pub async fn replace_task_tags(
    db: &SqlitePool,
    task_id: &str,
    tag_ids: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM task_tags WHERE task_id = ?")
        .bind(task_id)
        .execute(db)
        .await?;

    if tag_ids.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO task_tags (task_id, tag_id) ");
    builder.push_values(tag_ids, |mut row, tag_id| {
        row.push_bind(task_id).push_bind(tag_id);
    });
    builder.build().execute(db).await?;

    Ok(())
}

pub async fn remove_from_task(
    db: &SqlitePool,
    task_id: &str,
    tag_id: &str,
) -> Result<bool, sqlx::Error> {
    let affected = sqlx::query("DELETE FROM task_tags WHERE task_id = ? AND tag_id = ?")
        .bind(task_id)
        .bind(tag_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(affected > 0)
}

pub async fn most_used(
    db: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>(&format!(
        "{TAG_SELECT} \
         WHERE t.user_id = ? \
           AND (SELECT COUNT(*) FROM task_tags x WHERE x.tag_id = t.id) > 0 \
         ORDER BY task_count DESC, t.name ASC \
         LIMIT ?"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn search(db: &SqlitePool, user_id: &str, term: &str) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>(&format!(
        "{TAG_SELECT} WHERE t.user_id = ? AND t.name LIKE ? ORDER BY t.name ASC"
    ))
    .bind(user_id)
    .bind(format!("%{}%", term))
    .fetch_all(db)
    .await
}

pub async fn tag_stats(db: &SqlitePool, user_id: &str) -> Result<TagStats, sqlx::Error> {
    sqlx::query_as::<_, TagStats>(
        "SELECT \
            COUNT(DISTINCT t.id) AS total_tags, \
            COUNT(tt.task_id) AS total_tag_associations, \
            (SELECT COUNT(*) FROM tasks \
             WHERE user_id = ? AND id NOT IN (SELECT task_id FROM task_tags)) AS tasks_without_tags \
         FROM tags t \
         LEFT JOIN task_tags tt ON t.id = tt.tag_id \
         WHERE t.user_id = ?",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_one(db)
    .await
}

/// Tasks carrying a given tag, scoped to the tag owner's view of tasks.
pub async fn tasks_with_tag(
    db: &SqlitePool,
    tag_id: &str,
    user_id: &str,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "SELECT \
            ta.id, ta.user_id, ta.title, ta.description, ta.due_date, ta.priority, ta.status, \
            ta.category_id, ta.reminder_minutes, ta.created_at, ta.updated_at, \
            c.name AS category_name, c.color AS category_color \
         FROM tasks ta \
         INNER JOIN task_tags tt ON ta.id = tt.task_id \
         LEFT JOIN categories c ON ta.category_id = c.id \
         WHERE tt.tag_id = ? AND ta.user_id = ? \
         ORDER BY ta.created_at DESC",
    )
    .bind(tag_id)
    .bind(user_id)
    .fetch_all(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tasks;
    use crate::db::test_support::{seed_user, setup_test_db};
    use crate::models::{NewTask, Priority, TaskStatus};

    async fn seed_task(db: &SqlitePool, user_id: &str) -> String {
        tasks::insert_task(
            db,
            NewTask {
                title: "Tagged task".to_string(),
                description: None,
                due_date: None,
                priority: Priority::Medium,
                status: TaskStatus::Pending,
                category_id: None,
                reminder_minutes: 0,
            },
            user_id,
        )
        .await
        .expect("Failed to insert task")
        .id
    }

    #[tokio::test]
    async fn duplicate_name_rejected_per_owner() {
        let pool = setup_test_db().await;
        let alice = seed_user(&pool, "Alice", "alice@example.com").await;
        let bob = seed_user(&pool, "Bob", "bob@example.com").await;

        insert_tag(&pool, "urgent", "#FF6B6B", &alice)
            .await
            .expect("Failed to insert tag");

        let dup = insert_tag(&pool, "urgent", "#FF6B6B", &alice).await;
        assert!(matches!(dup, Err(AppError::Validation(_))));

        // Same name under a different owner is fine.
        let other = insert_tag(&pool, "urgent", "#4ECDC4", &bob).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn replace_is_destructive() {
        let pool = setup_test_db().await;
        let user = seed_user(&pool, "Alice", "alice@example.com").await;
        let task_id = seed_task(&pool, &user).await;

        let home = insert_tag(&pool, "home", "#8B3DFF", &user).await.unwrap();
        let work = insert_tag(&pool, "work", "#45B7D1", &user).await.unwrap();

        replace_task_tags(&pool, &task_id, &[home.id.clone(), work.id.clone()])
            .await
            .unwrap();
        assert_eq!(fetch_for_task(&pool, &task_id).await.unwrap().len(), 2);

        replace_task_tags(&pool, &task_id, &[work.id.clone()])
            .await
            .unwrap();
        let tags = fetch_for_task(&pool, &task_id).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "work");

        // An empty set clears the association entirely.
        replace_task_tags(&pool, &task_id, &[]).await.unwrap();
        assert!(fetch_for_task(&pool, &task_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_clears_associations() {
        let pool = setup_test_db().await;
        let user = seed_user(&pool, "Alice", "alice@example.com").await;
        let task_id = seed_task(&pool, &user).await;

        let tag = insert_tag(&pool, "home", "#8B3DFF", &user).await.unwrap();
        replace_task_tags(&pool, &task_id, &[tag.id.clone()])
            .await
            .unwrap();

        delete_tag(&pool, &tag.id, &user)
            .await
            .unwrap()
            .expect("Tag not found");

        assert!(fetch_for_task(&pool, &task_id).await.unwrap().is_empty());
        assert!(find_tag(&pool, &tag.id, &user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn most_used_orders_by_association_count() {
        let pool = setup_test_db().await;
        let user = seed_user(&pool, "Alice", "alice@example.com").await;
        let task_a = seed_task(&pool, &user).await;
        let task_b = seed_task(&pool, &user).await;

        let busy = insert_tag(&pool, "busy", "#FF6B6B", &user).await.unwrap();
        let quiet = insert_tag(&pool, "quiet", "#4ECDC4", &user).await.unwrap();
        insert_tag(&pool, "unused", "#96CEB4", &user).await.unwrap();

        replace_task_tags(&pool, &task_a, &[busy.id.clone(), quiet.id.clone()])
            .await
            .unwrap();
        replace_task_tags(&pool, &task_b, &[busy.id.clone()])
            .await
            .unwrap();

        let top = most_used(&pool, &user, 10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "busy");
        assert_eq!(top[0].task_count, 2);
        assert_eq!(top[1].name, "quiet");
    }
}
