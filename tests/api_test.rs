use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use taskit_backend::api::router;
use taskit_backend::state::AppState;

/// Single-connection pool: each in-memory SQLite connection is a separate
/// database.
async fn test_app() -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    router(AppState { db: pool })
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is not JSON")
    };

    (status, value)
}

async fn register_user(app: &Router, name: &str, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/users",
        None,
        Some(json!({"nome": name, "email": email, "senha": "hunter22"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().expect("user id missing").to_string()
}

async fn create_task(app: &Router, user: &str, title: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/tasks",
        Some(user),
        Some(json!({"title": title})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().expect("task id missing").to_string()
}

async fn create_item(app: &Router, user: &str, task_id: &str, content: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        &format!("/tasks/{task_id}/checklist"),
        Some(user),
        Some(json!({"content": content})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().expect("item id missing").to_string()
}

#[tokio::test]
async fn user_registration_hides_password_and_rejects_duplicates() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/users",
        None,
        Some(json!({"nome": "Alice", "email": "alice@example.com", "senha": "hunter22"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["nome"], json!("Alice"));
    assert!(body["data"].get("senha").is_none());
    assert!(body["data"].get("password_hash").is_none());

    let (status, body) = send(
        &app,
        "POST",
        "/users",
        None,
        Some(json!({"nome": "Other", "email": "alice@example.com", "senha": "hunter22"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    // Too-short password is also refused up front.
    let (status, _) = send(
        &app,
        "POST",
        "/users",
        None,
        Some(json!({"nome": "Short", "email": "short@example.com", "senha": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_checks_credentials() {
    let app = test_app().await;
    register_user(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/users/login",
        None,
        Some(json!({"email": "alice@example.com", "senha": "hunter22"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], json!("alice@example.com"));

    let (status, _) = send(
        &app,
        "POST",
        "/users/login",
        None,
        Some(json!({"email": "alice@example.com", "senha": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn task_creation_validates_input() {
    let app = test_app().await;
    let user = register_user(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(&app, "POST", "/tasks", Some(&user), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(
        &app,
        "POST",
        "/tasks",
        Some(&user),
        Some(json!({"title": "x", "priority": "urgent"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/tasks",
        Some(&user),
        Some(json!({"title": "x", "status": "archived"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/tasks",
        Some(&user),
        Some(json!({"title": "Write report", "priority": "high"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], json!("pending"));
    assert_eq!(body["data"]["priority"], json!("high"));

    // The request without the actor header is rejected before any lookup.
    let (status, _) = send(&app, "GET", "/tasks", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tasks_are_scoped_to_their_owner() {
    let app = test_app().await;
    let alice = register_user(&app, "Alice", "alice@example.com").await;
    let bob = register_user(&app, "Bob", "bob@example.com").await;

    let task_id = create_task(&app, &alice, "Private task").await;

    let (status, _) = send(&app, "GET", &format!("/tasks/{task_id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/tasks", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(1));
}

#[tokio::test]
async fn complete_marks_task_done() {
    let app = test_app().await;
    let user = register_user(&app, "Alice", "alice@example.com").await;
    let task_id = create_task(&app, &user, "Ship it").await;

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/tasks/{task_id}/complete"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("done"));

    let (status, _) = send(
        &app,
        "PATCH",
        "/tasks/does-not-exist/complete",
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reorder_round_trips_through_the_api() {
    let app = test_app().await;
    let user = register_user(&app, "Alice", "alice@example.com").await;
    let task_id = create_task(&app, &user, "Groceries").await;

    let a = create_item(&app, &user, &task_id, "Milk").await;
    let b = create_item(&app, &user, &task_id, "Eggs").await;
    let c = create_item(&app, &user, &task_id, "Bread").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/tasks/{task_id}/checklist/reorder"),
        Some(&user),
        Some(json!({"itemsOrder": [c, b, a]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/tasks/{task_id}/checklist"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["Bread", "Eggs", "Milk"]);
}

#[tokio::test]
async fn reorder_requires_an_array() {
    let app = test_app().await;
    let user = register_user(&app, "Alice", "alice@example.com").await;
    let task_id = create_task(&app, &user, "Groceries").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/tasks/{task_id}/checklist/reorder"),
        Some(&user),
        Some(json!({"itemsOrder": "not-an-array"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    // An empty order on an empty checklist is a trivial success.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/tasks/{task_id}/checklist/reorder"),
        Some(&user),
        Some(json!({"itemsOrder": []})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn toggle_requires_a_boolean() {
    let app = test_app().await;
    let user = register_user(&app, "Alice", "alice@example.com").await;
    let task_id = create_task(&app, &user, "Groceries").await;
    let item = create_item(&app, &user, &task_id, "Milk").await;

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/checklist/{item}/toggle"),
        Some(&user),
        Some(json!({"completed": "yes"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/checklist/{item}/toggle"),
        Some(&user),
        Some(json!({"completed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], json!(true));

    let (status, _) = send(
        &app,
        "PATCH",
        "/checklist/unknown-item/toggle",
        Some(&user),
        Some(json!({"completed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn category_with_tasks_cannot_be_deleted() {
    let app = test_app().await;
    let user = register_user(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/categories",
        Some(&user),
        Some(json!({"name": "Errands"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let category_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        "/tasks",
        Some(&user),
        Some(json!({"title": "Post office", "category_id": category_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/categories/{category_id}"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"].as_str().unwrap().contains("associated tasks"),
        "unexpected error body: {body}"
    );

    // The category is still there afterwards.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/categories/{category_id}"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn tag_association_is_replace_all() {
    let app = test_app().await;
    let user = register_user(&app, "Alice", "alice@example.com").await;
    let task_id = create_task(&app, &user, "Tagged").await;

    let (_, body) = send(
        &app,
        "POST",
        "/tags",
        Some(&user),
        Some(json!({"name": "home"})),
    )
    .await;
    let home = body["data"]["id"].as_str().unwrap().to_string();
    let (_, body) = send(
        &app,
        "POST",
        "/tags",
        Some(&user),
        Some(json!({"name": "work"})),
    )
    .await;
    let work = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/tasks/{task_id}/tags"),
        Some(&user),
        Some(json!({"tagIds": [home, work]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/tasks/{task_id}/tags"),
        Some(&user),
        Some(json!({"tagIds": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(
        &app,
        "POST",
        &format!("/tasks/{task_id}/tags"),
        Some(&user),
        Some(json!({"tagIds": []})),
    )
    .await;
    assert_eq!(body["success"], json!(true));

    let (status, body) = send(
        &app,
        "GET",
        &format!("/tasks/{task_id}/tags"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(0));
}

#[tokio::test]
async fn note_permissions_follow_author_and_owner() {
    let app = test_app().await;
    let alice = register_user(&app, "Alice", "alice@example.com").await;
    let bob = register_user(&app, "Bob", "bob@example.com").await;
    let task_id = create_task(&app, &alice, "Shared").await;

    // Bob (not the owner) can still attach a note to the task.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/tasks/{task_id}/notes"),
        Some(&bob),
        Some(json!({"content": "Bob's note"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let note_id = body["data"]["id"].as_str().unwrap().to_string();

    // Alice is not the author, so her edit attempt reads as not-found.
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/notes/{note_id}"),
        Some(&alice),
        Some(json!({"content": "hijacked"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // But as task owner she may delete it.
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/notes/{note_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_endpoint_answers() {
    let app = test_app().await;
    let (status, _) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
