use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::json;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use meet_gate::authz::Role;
use meet_gate::create_app;
use meet_gate::directory::{AccountDirectory, SqliteDirectory};
use meet_gate::models::account::NewAccount;
use meet_gate::utils::hash_password;

async fn setup_app() -> Result<(Router, SqlitePool, TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test_api.db");
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

    // tests run in CI/container; ensure a JWT secret is available for signing tokens
    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok((app, pool, dir))
}

async fn seed_account(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    role: Role,
    password: &str,
) -> Result<()> {
    let directory = SqliteDirectory::new(pool.clone());
    directory
        .create(NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            display_name: username.to_string(),
            role,
            password_hash: hash_password(password)?,
        })
        .await?;
    Ok(())
}

async fn login(app: &Router, email: &str, password: &str) -> Result<String> {
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": email, "password": password}).to_string(),
        ))?;
    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    if status != StatusCode::OK {
        panic!(
            "login failed: {} - {}",
            status,
            String::from_utf8_lossy(&body_bytes)
        );
    }
    let auth_res: serde_json::Value = serde_json::from_slice(&body_bytes)?;
    Ok(auth_res
        .get("token")
        .and_then(|v| v.as_str())
        .context("missing token")?
        .to_string())
}

async fn read_json(resp: Response) -> Result<(StatusCode, serde_json::Value)> {
    let status = resp.status();
    let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes)?
    };
    Ok((status, value))
}

#[tokio::test]
async fn signup_approval_flow() -> Result<()> {
    let (app, pool, _dir) = setup_app().await?;
    seed_account(&pool, "root", "root@example.com", Role::EnvAdmin, "password123").await?;

    // -- file a signup request (public)
    let req = Request::builder()
        .method("POST")
        .uri("/signup")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "email": "alice@example.com",
                "full_name": "Alice Doe",
                "note": "needs meeting rooms",
                "password": "password123"
            })
            .to_string(),
        ))?;
    let (status, submitted) = read_json(app.clone().oneshot(req).await?).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(submitted["status"], "pending");
    let request_id = submitted["id"]
        .as_str()
        .context("missing request id")?
        .to_string();

    // -- duplicate submission is a conflict
    let req = Request::builder()
        .method("POST")
        .uri("/signup")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "email": "alice@example.com",
                "full_name": "Alice Again",
                "password": "password123"
            })
            .to_string(),
        ))?;
    let (status, dup) = read_json(app.clone().oneshot(req).await?).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(dup["error"], "duplicate_email");

    // -- admin reviews the queue
    let token = login(&app, "root@example.com", "password123").await?;
    let req = Request::builder()
        .method("GET")
        .uri("/admin/requests?status=pending")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let (status, listed) = read_json(app.clone().oneshot(req).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(|a| a.len()), Some(1));

    // -- approve it
    let req = Request::builder()
        .method("POST")
        .uri(format!("/admin/requests/{}/approve", request_id))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(json!({"decision_note": "ok"}).to_string()))?;
    let (status, approved) = read_json(app.clone().oneshot(req).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["request"]["status"], "approved");
    assert_eq!(approved["account"]["username"], "alice");
    assert_eq!(approved["account"]["role"], "USER");
    let temp_password = approved["temp_password"]
        .as_str()
        .context("temp password must be surfaced once")?
        .to_string();

    // -- the fresh account can log in with the temporary password
    let alice_token = login(&app, "alice@example.com", &temp_password).await?;

    // -- and is a plain USER: no admin surface
    let req = Request::builder()
        .method("GET")
        .uri("/admin/requests")
        .header("authorization", format!("Bearer {}", alice_token))
        .body(Body::empty())?;
    let (status, denied) = read_json(app.clone().oneshot(req).await?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(denied["error"], "forbidden");

    // -- /auth/me reports the acting role
    let req = Request::builder()
        .method("GET")
        .uri("/auth/me")
        .header("authorization", format!("Bearer {}", alice_token))
        .body(Body::empty())?;
    let (status, me) = read_json(app.clone().oneshot(req).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "USER");
    assert_eq!(me["account"]["email"], "alice@example.com");

    Ok(())
}

#[tokio::test]
async fn reset_after_approve_leaves_the_account_alone() -> Result<()> {
    let (app, pool, _dir) = setup_app().await?;
    seed_account(&pool, "root", "root@example.com", Role::EnvAdmin, "password123").await?;
    let token = login(&app, "root@example.com", "password123").await?;

    let req = Request::builder()
        .method("POST")
        .uri("/signup")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "email": "dana@example.com",
                "full_name": "Dana Reyes",
                "password": "password123"
            })
            .to_string(),
        ))?;
    let (status, submitted) = read_json(app.clone().oneshot(req).await?).await?;
    assert_eq!(status, StatusCode::CREATED);
    let request_id = submitted["id"]
        .as_str()
        .context("missing request id")?
        .to_string();

    let req = Request::builder()
        .method("POST")
        .uri(format!("/admin/requests/{}/approve", request_id))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(json!({}).to_string()))?;
    let (status, _) = read_json(app.clone().oneshot(req).await?).await?;
    assert_eq!(status, StatusCode::OK);

    let req = Request::builder()
        .method("POST")
        .uri(format!("/admin/requests/{}/reset", request_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let (status, reset) = read_json(app.clone().oneshot(req).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["status"], "pending");
    assert!(reset["decided_at"].is_null());
    assert!(reset["decided_by"].is_null());
    assert_eq!(reset["decision_note"], "");

    // The account created by the approval is still there and active.
    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM accounts WHERE username = 'dana' AND active = 1",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(active, 1);

    Ok(())
}

#[tokio::test]
async fn unauthenticated_and_garbage_tokens_are_rejected() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;

    // No token: admin surface is unauthorized.
    let req = Request::builder()
        .method("GET")
        .uri("/admin/requests")
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Garbage token is rejected too.
    let req = Request::builder()
        .method("GET")
        .uri("/admin/requests")
        .header("authorization", "Bearer not-a-token")
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn health_reports_db_state() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())?;
    let (status, health) = read_json(app.clone().oneshot(req).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["db_ok"], true);

    Ok(())
}
