//! End-to-end role and hierarchy scenarios, driven over HTTP against the
//! seeded demo fixture: Headquarters (root) with children Engineering and
//! Sales; an owner over Headquarters, an admin in Engineering, a viewer in
//! Sales.

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use taskdeck::create_app;
use taskdeck::seed::DEMO_PASSWORD;

struct TestApp {
    app: Router,
    pool: SqlitePool,
    // keep the sqlite file alive for the duration of the test
    _dir: TempDir,
}

async fn setup() -> Result<TestApp> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    taskdeck::seed::seed(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok(TestApp {
        app,
        pool,
        _dir: dir,
    })
}

async fn read_json(resp: Response) -> Result<Value> {
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn login(app: &Router, email: &str) -> Result<String> {
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "email": email, "password": DEMO_PASSWORD }).to_string(),
        ))?;

    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let body = read_json(resp).await?;
    if status != StatusCode::OK {
        panic!("login as {} failed: {} - {}", email, status, body);
    }

    Ok(body
        .get("token")
        .and_then(|t| t.as_str())
        .context("missing token")?
        .to_string())
}

async fn get(app: &Router, uri: &str, token: &str) -> Result<Response> {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    Ok(app.clone().oneshot(req).await?)
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    payload: &Value,
) -> Result<Response> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(payload.to_string()))?;
    Ok(app.clone().oneshot(req).await?)
}

async fn task_id_by_title(pool: &SqlitePool, title: &str) -> Result<Uuid> {
    let (id,): (Uuid,) =
        sqlx::query_as("SELECT id FROM tasks WHERE title = ? AND deleted_at IS NULL")
            .bind(title)
            .fetch_one(pool)
            .await?;
    Ok(id)
}

#[tokio::test]
async fn task_listing_is_scoped_to_accessible_organizations() -> Result<()> {
    let t = setup().await?;

    // Owner over the root sees tasks in Headquarters and both children.
    let owner = login(&t.app, "owner@example.com").await?;
    let resp = get(&t.app, "/tasks", &owner).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let tasks = read_json(resp).await?;
    assert_eq!(tasks.as_array().unwrap().len(), 5);

    // Admin in Engineering sees Engineering tasks only.
    let admin = login(&t.app, "admin@example.com").await?;
    let resp = get(&t.app, "/tasks", &admin).await?;
    let tasks = read_json(resp).await?;
    let titles: Vec<&str> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.get("title").and_then(|s| s.as_str()).unwrap())
        .collect();
    assert_eq!(tasks.as_array().unwrap().len(), 2, "got: {:?}", titles);
    assert!(titles.contains(&"Write unit tests"));
    assert!(titles.contains(&"Deploy to production"));

    // Viewer in Sales sees the single Sales task.
    let viewer = login(&t.app, "viewer@example.com").await?;
    let resp = get(&t.app, "/tasks", &viewer).await?;
    let tasks = read_json(resp).await?;
    assert_eq!(tasks.as_array().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() -> Result<()> {
    let t = setup().await?;

    let req = Request::builder()
        .method("GET")
        .uri("/tasks")
        .body(Body::empty())?;
    let resp = t.app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn create_is_role_gated_and_stamps_the_principal() -> Result<()> {
    let t = setup().await?;

    // Viewer may not create at all.
    let viewer = login(&t.app, "viewer@example.com").await?;
    let resp = send_json(
        &t.app,
        "POST",
        "/tasks",
        &viewer,
        &json!({ "title": "Sneaky task" }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Admin creates; org and creator come from the token even when the
    // payload tries to smuggle its own organization in.
    let admin = login(&t.app, "admin@example.com").await?;
    let (hq_id,): (Uuid,) = sqlx::query_as("SELECT id FROM organizations WHERE name = ?")
        .bind("Headquarters")
        .fetch_one(&t.pool)
        .await?;
    let (eng_id,): (Uuid,) = sqlx::query_as("SELECT id FROM organizations WHERE name = ?")
        .bind("Engineering")
        .fetch_one(&t.pool)
        .await?;

    let resp = send_json(
        &t.app,
        "POST",
        "/tasks",
        &admin,
        &json!({
            "title": "Rotate signing keys",
            "organization_id": hq_id,
            "created_by_id": Uuid::new_v4(),
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let task = read_json(resp).await?;
    assert_eq!(
        task.get("organization_id").and_then(|v| v.as_str()),
        Some(eng_id.to_string().as_str())
    );

    let (admin_id,): (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind("admin@example.com")
        .fetch_one(&t.pool)
        .await?;
    assert_eq!(
        task.get("created_by_id").and_then(|v| v.as_str()),
        Some(admin_id.to_string().as_str())
    );

    Ok(())
}

#[tokio::test]
async fn owner_reaches_into_child_organizations() -> Result<()> {
    let t = setup().await?;
    let owner = login(&t.app, "owner@example.com").await?;

    // "Write unit tests" lives in Engineering, a child of the owner's org.
    let task_id = task_id_by_title(&t.pool, "Write unit tests").await?;

    let resp = get(&t.app, &format!("/tasks/{task_id}"), &owner).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send_json(
        &t.app,
        "PUT",
        &format!("/tasks/{task_id}"),
        &owner,
        &json!({ "status": "Done" }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let task = read_json(resp).await?;
    assert_eq!(task.get("status").and_then(|v| v.as_str()), Some("Done"));

    Ok(())
}

#[tokio::test]
async fn admin_cannot_modify_outside_their_own_organization() -> Result<()> {
    let t = setup().await?;
    let admin = login(&t.app, "admin@example.com").await?;

    // A task in Sales (a sibling organization) is invisible to the admin:
    // the read gate already rejects it.
    let sales_task = task_id_by_title(&t.pool, "Review documentation").await?;
    let resp = send_json(
        &t.app,
        "PUT",
        &format!("/tasks/{sales_task}"),
        &admin,
        &json!({ "status": "Done" }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Inside their own organization the admin modifies freely.
    let eng_task = task_id_by_title(&t.pool, "Write unit tests").await?;
    let resp = send_json(
        &t.app,
        "PUT",
        &format!("/tasks/{eng_task}"),
        &admin,
        &json!({ "status": "Done" }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn viewer_reads_but_never_writes() -> Result<()> {
    let t = setup().await?;
    let viewer = login(&t.app, "viewer@example.com").await?;

    let sales_task = task_id_by_title(&t.pool, "Review documentation").await?;

    // Read succeeds inside the viewer's organization...
    let resp = get(&t.app, &format!("/tasks/{sales_task}"), &viewer).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // ...while update and delete are both refused.
    let resp = send_json(
        &t.app,
        "PUT",
        &format!("/tasks/{sales_task}"),
        &viewer,
        &json!({ "status": "Done" }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/tasks/{sales_task}"))
        .header("authorization", format!("Bearer {viewer}"))
        .body(Body::empty())?;
    let resp = t.app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Tasks outside the viewer's organization are forbidden even to read.
    let eng_task = task_id_by_title(&t.pool, "Write unit tests").await?;
    let resp = get(&t.app, &format!("/tasks/{eng_task}"), &viewer).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn delete_soft_deletes_and_hides_the_task() -> Result<()> {
    let t = setup().await?;
    let admin = login(&t.app, "admin@example.com").await?;

    let eng_task = task_id_by_title(&t.pool, "Deploy to production").await?;

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/tasks/{eng_task}"))
        .header("authorization", format!("Bearer {admin}"))
        .body(Body::empty())?;
    let resp = t.app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = get(&t.app, &format!("/tasks/{eng_task}"), &admin).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // The row survives with a deletion marker.
    let (deleted,): (Option<String>,) =
        sqlx::query_as("SELECT deleted_at FROM tasks WHERE id = ?")
            .bind(eng_task)
            .fetch_one(&t.pool)
            .await?;
    assert!(deleted.is_some());

    Ok(())
}

#[tokio::test]
async fn organization_listing_follows_the_accessible_set() -> Result<()> {
    let t = setup().await?;

    let owner = login(&t.app, "owner@example.com").await?;
    let resp = get(&t.app, "/organizations", &owner).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let orgs = read_json(resp).await?;
    let names: Vec<&str> = orgs
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.get("name").and_then(|s| s.as_str()).unwrap())
        .collect();
    assert_eq!(names, vec!["Engineering", "Headquarters", "Sales"]);

    let admin = login(&t.app, "admin@example.com").await?;
    let resp = get(&t.app, "/organizations", &admin).await?;
    let orgs = read_json(resp).await?;
    let names: Vec<&str> = orgs
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.get("name").and_then(|s| s.as_str()).unwrap())
        .collect();
    assert_eq!(names, vec!["Engineering"]);

    Ok(())
}

#[tokio::test]
async fn me_reflects_the_token_identity() -> Result<()> {
    let t = setup().await?;

    let owner = login(&t.app, "owner@example.com").await?;
    let resp = get(&t.app, "/auth/me", &owner).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let user = read_json(resp).await?;
    assert_eq!(
        user.get("email").and_then(|v| v.as_str()),
        Some("owner@example.com")
    );
    assert_eq!(user.get("role").and_then(|v| v.as_str()), Some("owner"));

    Ok(())
}
