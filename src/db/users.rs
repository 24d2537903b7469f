use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{UpdateUserRequest, User, UserStats};

const USER_SELECT: &str =
    "SELECT id, name, email, created_at, updated_at FROM users";

/// Internal row carrying the hash; never leaves this module.
#[derive(Debug, FromRow)]
struct AuthRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    created_at: String,
    updated_at: String,
}

pub async fn fetch_users(db: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{USER_SELECT} ORDER BY created_at DESC"))
        .fetch_all(db)
        .await
}

pub async fn find_user(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn email_exists(
    db: &SqlitePool,
    email: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let existing: Option<String> = match exclude_id {
        Some(exclude) => {
            sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(exclude)
                .fetch_optional(db)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(db)
                .await?
        }
    };

    Ok(existing.is_some())
}

pub async fn insert_user(
    db: &SqlitePool,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    if email_exists(db, email, None).await? {
        return Err(AppError::validation("email is already in use"));
    }

    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(User {
        id,
        name: name.to_string(),
        email: email.to_string(),
        created_at: now.clone(),
        updated_at: now,
    })
}

pub async fn update_user(
    db: &SqlitePool,
    id: &str,
    req: UpdateUserRequest,
) -> Result<Option<User>, AppError> {
    let Some(mut current) = find_user(db, id).await? else {
        return Ok(None);
    };

    if let Some(email) = &req.email {
        if email_exists(db, email, Some(id)).await? {
            return Err(AppError::validation(
                "email is already in use by another user",
            ));
        }
    }

    if let Some(name) = req.nome {
        current.name = name;
    }
    if let Some(email) = req.email {
        current.email = email;
    }
    let now = Utc::now().to_rfc3339();
    current.updated_at = now.clone();

    sqlx::query("UPDATE users SET name = ?, email = ?, updated_at = ? WHERE id = ?")
        .bind(&current.name)
        .bind(&current.email)
        .bind(&now)
        .bind(id)
        .execute(db)
        .await?;

    Ok(Some(current))
}

pub async fn update_password(
    db: &SqlitePool,
    id: &str,
    new_password: &str,
) -> Result<bool, AppError> {
    let password_hash = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;
    let now = Utc::now().to_rfc3339();

    let affected = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(&now)
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(affected > 0)
}

pub async fn delete_user(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    let Some(user) = find_user(db, id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    Ok(Some(user))
}

pub async fn authenticate(
    db: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, AuthRow>(
        "SELECT id, name, email, password_hash, created_at, updated_at \
         FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    if !bcrypt::verify(password, &row.password_hash)? {
        return Ok(None);
    }

    Ok(Some(User {
        id: row.id,
        name: row.name,
        email: row.email,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub async fn user_stats(db: &SqlitePool, user_id: &str) -> Result<UserStats, sqlx::Error> {
    sqlx::query_as::<_, UserStats>(
        "SELECT \
            (SELECT COUNT(*) FROM tasks WHERE user_id = ?) AS total_tasks, \
            (SELECT COUNT(*) FROM categories WHERE user_id = ?) AS total_categories, \
            (SELECT COUNT(*) FROM tags WHERE user_id = ?) AS total_tags, \
            (SELECT COUNT(*) FROM tasks WHERE user_id = ? AND status = 'done') AS completed_tasks, \
            (SELECT COUNT(*) FROM tasks \
             WHERE user_id = ? AND due_date < date('now') AND status != 'done') AS overdue_tasks",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_one(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    #[tokio::test]
    async fn register_hashes_password_and_rejects_duplicates() {
        let pool = setup_test_db().await;

        let user = insert_user(&pool, "Alice", "alice@example.com", "hunter22")
            .await
            .expect("Failed to insert user");
        assert_eq!(user.email, "alice@example.com");

        // The stored hash verifies against the original password and is not
        // the password itself.
        let hash: String =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
                .bind(&user.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_ne!(hash, "hunter22");
        assert!(bcrypt::verify("hunter22", &hash).unwrap());

        let dup = insert_user(&pool, "Alice Again", "alice@example.com", "hunter22").await;
        assert!(matches!(dup, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn authenticate_checks_credentials() {
        let pool = setup_test_db().await;

        insert_user(&pool, "Alice", "alice@example.com", "hunter22")
            .await
            .unwrap();

        let ok = authenticate(&pool, "alice@example.com", "hunter22")
            .await
            .unwrap();
        assert!(ok.is_some());

        let wrong = authenticate(&pool, "alice@example.com", "wrong")
            .await
            .unwrap();
        assert!(wrong.is_none());

        let unknown = authenticate(&pool, "nobody@example.com", "hunter22")
            .await
            .unwrap();
        assert!(unknown.is_none());
    }
}
