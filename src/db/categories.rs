use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Category, CategoryStats, UpdateCategoryRequest};

/// Palette offered to clients when picking a category color.
pub const SUGGESTED_COLORS: &[&str] = &[
    "#8B3DFF", "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FECA57", "#FF9FF3", "#54A0FF",
    "#5F27CD", "#00D2D3", "#FF9F43", "#10AC84", "#EE5A24", "#0984E3", "#6C5CE7",
];

/// List view counts only open tasks; the single-row lookup counts all of
/// them. Both match the behavior the frontend was built against.
pub async fn fetch_categories(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT \
            c.id, c.user_id, c.name, c.color, c.created_at, \
            COUNT(t.id) AS task_count \
         FROM categories c \
         LEFT JOIN tasks t ON c.id = t.category_id AND t.status != 'done' \
         WHERE c.user_id = ? \
         GROUP BY c.id \
         ORDER BY c.name ASC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn find_category(
    db: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT \
            c.id, c.user_id, c.name, c.color, c.created_at, \
            COUNT(t.id) AS task_count \
         FROM categories c \
         LEFT JOIN tasks t ON c.id = t.category_id \
         WHERE c.id = ? AND c.user_id = ? \
         GROUP BY c.id",
    )
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
        Some(exclude) => sqlx::query_scalar(
            "SELECT id FROM categories WHERE name = ? AND user_id = ? AND id != ?",
        )
        .bind(name)
        .bind(user_id)
        .bind(exclude)
        .fetch_optional(db)
        .await?,
        None => sqlx::query_scalar("SELECT id FROM categories WHERE name = ? AND user_id = ?")
            .bind(name)
            .bind(user_id)
            .fetch_optional(db)
            .await?,
    };

    Ok(existing.is_some())
}

pub async fn insert_category(
    db: &SqlitePool,
    name: &str,
    color: &str,
    user_id: &str,
) -> Result<Category, AppError> {
    if name_exists(db, name, user_id, None).await? {
        return Err(AppError::validation(
            "a category with this name already exists",
        ));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO categories (id, user_id, name, color, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(name)
    .bind(color)
    .bind(&now)
    .execute(db)
    .await?;

    find_category(db, &id, user_id)
        .await?
        .ok_or(AppError::Internal)
}

pub async fn update_category(
    db: &SqlitePool,
    id: &str,
    user_id: &str,
    req: UpdateCategoryRequest,
) -> Result<Option<Category>, AppError> {
    let Some(mut current) = find_category(db, id, user_id).await? else {
        return Ok(None);
    };

    if let Some(name) = req.name {
        if name_exists(db, &name, user_id, Some(id)).await? {
            return Err(AppError::validation(
                "a category with this name already exists",
            ));
        }
        current.name = name;
    }
    if let Some(color) = req.color {
        current.color = color;
    }

    sqlx::query("UPDATE categories SET name = ?, color = ? WHERE id = ? AND user_id = ?")
        .bind(&current.name)
        .bind(&current.color)
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(find_category(db, id, user_id).await?)
}

/// Deletion is refused while any task still references the category.
pub async fn delete_category(
    db: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<Category>, AppError> {
    let Some(category) = find_category(db, id, user_id).await? else {
        return Ok(None);
    };

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE category_id = ?")
        .bind(id)
        .fetch_one(db)
        .await?;

    if count > 0 {
        return Err(AppError::CategoryInUse { count });
    }

    sqlx::query("DELETE FROM categories WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(Some(category))
}

pub async fn most_used(
    db: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT \
            c.id, c.user_id, c.name, c.color, c.created_at, \
            COUNT(t.id) AS task_count \
         FROM categories c \
         LEFT JOIN tasks t ON c.id = t.category_id \
         WHERE c.user_id = ? \
         GROUP BY c.id \
         HAVING COUNT(t.id) > 0 \
         ORDER BY task_count DESC, c.name ASC \
         LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn search(
    db: &SqlitePool,
    user_id: &str,
    term: &str,
) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT \
            c.id, c.user_id, c.name, c.color, c.created_at, \
            COUNT(t.id) AS task_count \
         FROM categories c \
         LEFT JOIN tasks t ON c.id = t.category_id \
         WHERE c.user_id = ? AND c.name LIKE ? \
         GROUP BY c.id \
         ORDER BY c.name ASC",
    )
    .bind(user_id)
    .bind(format!("%{}%", term))
    .fetch_all(db)
    .await
}

pub async fn category_stats(
    db: &SqlitePool,
    user_id: &str,
) -> Result<CategoryStats, sqlx::Error> {
    sqlx::query_as::<_, CategoryStats>(
        "SELECT \
            COUNT(DISTINCT c.id) AS total_categories, \
            COUNT(t.id) AS total_tasks_with_category, \
            (SELECT COUNT(*) FROM tasks \
             WHERE user_id = ? AND category_id IS NULL) AS tasks_without_category \
         FROM categories c \
         LEFT JOIN tasks t ON c.id = t.category_id \
         WHERE c.user_id = ?",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_one(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tasks;
    use crate::db::test_support::{seed_user, setup_test_db};
    use crate::models::{NewTask, Priority, TaskStatus};

    #[tokio::test]
    async fn delete_refused_while_tasks_reference_it() {
        let pool = setup_test_db().await;
        let user = seed_user(&pool, "Alice", "alice@example.com").await;

        let category = insert_category(&pool, "Errands", "#8B3DFF", &user)
            .await
            .expect("Failed to insert category");

        let task = tasks::insert_task(
            &pool,
            NewTask {
                title: "Post office".to_string(),
                description: None,
                due_date: None,
                priority: Priority::Medium,
                status: TaskStatus::Pending,
                category_id: Some(category.id.clone()),
                reminder_minutes: 0,
            },
            &user,
        )
        .await
        .unwrap();

        let refused = delete_category(&pool, &category.id, &user).await;
        assert!(matches!(refused, Err(AppError::CategoryInUse { count: 1 })));

        // Nothing changed: category and task are both still there.
        assert!(
            find_category(&pool, &category.id, &user)
                .await
                .unwrap()
                .is_some()
        );
        let task_after = tasks::find_task(&pool, &task.id, &user)
            .await
            .unwrap()
            .expect("Task disappeared");
        assert_eq!(task_after.category_id.as_deref(), Some(category.id.as_str()));

        // Once the task is gone the delete goes through.
        let _ = tasks::delete_task(&pool, &task.id, &user).await.unwrap();
        let deleted = delete_category(&pool, &category.id, &user)
            .await
            .unwrap()
            .expect("Category not found");
        assert_eq!(deleted.id, category.id);
    }

    #[tokio::test]
    async fn duplicate_name_rejected_per_owner() {
        let pool = setup_test_db().await;
        let alice = seed_user(&pool, "Alice", "alice@example.com").await;
        let bob = seed_user(&pool, "Bob", "bob@example.com").await;

        insert_category(&pool, "Work", "#45B7D1", &alice)
            .await
            .unwrap();

        let dup = insert_category(&pool, "Work", "#45B7D1", &alice).await;
        assert!(matches!(dup, Err(AppError::Validation(_))));

        assert!(insert_category(&pool, "Work", "#45B7D1", &bob).await.is_ok());
    }

    #[tokio::test]
    async fn cross_owner_lookup_misses() {
        let pool = setup_test_db().await;
        let alice = seed_user(&pool, "Alice", "alice@example.com").await;
        let bob = seed_user(&pool, "Bob", "bob@example.com").await;

        let category = insert_category(&pool, "Private", "#5F27CD", &alice)
            .await
            .unwrap();

        assert!(
            find_category(&pool, &category.id, &bob)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            delete_category(&pool, &category.id, &bob)
                .await
                .unwrap()
                .is_none()
        );
    }
}
