use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};

use meet_gate::authz::Role;
use meet_gate::directory::{AccountDirectory, SqliteDirectory};
use meet_gate::errors::AppError;
use meet_gate::models::account::{Account, NewAccount};
use meet_gate::models::signup::{SignupStatus, SubmitSignupRequest};
use meet_gate::utils::{hash_password, verify_password};
use meet_gate::workflow::{CredentialPolicy, SignupWorkflow};

async fn setup_pool() -> Result<(SqlitePool, TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test_workflow.db");
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

    Ok((pool, dir))
}

async fn seed_account(
    directory: &SqliteDirectory,
    username: &str,
    email: &str,
    role: Role,
) -> Result<Account> {
    let db_account = directory
        .create(NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            display_name: username.to_string(),
            role,
            password_hash: hash_password("password123")?,
        })
        .await?;
    Ok(db_account.try_into()?)
}

fn submission(email: &str, full_name: &str) -> SubmitSignupRequest {
    serde_json::from_value(serde_json::json!({
        "email": email,
        "full_name": full_name,
        "note": "",
        "password": "password123"
    }))
    .expect("valid submission payload")
}

#[tokio::test]
async fn submit_creates_pending_request() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let directory = Arc::new(SqliteDirectory::new(pool.clone()));
    let workflow = SignupWorkflow::new(pool.clone(), directory.clone());

    let request = workflow
        .submit(submission("alice@example.com", "Alice Doe"))
        .await?;

    assert_eq!(request.status, SignupStatus::Pending);
    assert!(request.decided_at.is_none());
    assert!(request.decided_by.is_none());
    assert_eq!(request.decision_note, "");
    assert!(request.decision_fields_consistent());

    // No account appears before approval.
    assert!(directory.find_by_username("alice").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_rejected() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let directory = Arc::new(SqliteDirectory::new(pool.clone()));
    let workflow = SignupWorkflow::new(pool.clone(), directory.clone());

    workflow
        .submit(submission("bob@example.com", "Bob One"))
        .await?;

    let err = workflow
        .submit(submission("bob@example.com", "Bob Two"))
        .await
        .expect_err("second submission with the same email must fail");
    assert!(matches!(err, AppError::DuplicateEmail(_)));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM signup_requests")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1, "no second record may be created");

    // An email held by an existing account is just as taken.
    seed_account(&directory, "carol", "carol@example.com", Role::User).await?;
    let err = workflow
        .submit(submission("carol@example.com", "Carol Clone"))
        .await
        .expect_err("account-held email must be rejected");
    assert!(matches!(err, AppError::DuplicateEmail(_)));

    Ok(())
}

#[tokio::test]
async fn approve_creates_one_account_and_is_idempotent() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let directory = Arc::new(SqliteDirectory::new(pool.clone()));
    let workflow = SignupWorkflow::new(pool.clone(), directory.clone());
    let admin = seed_account(&directory, "root", "root@example.com", Role::EnvAdmin).await?;

    let request = workflow
        .submit(submission("alice@example.com", "Alice Doe"))
        .await?;

    let outcome = workflow.approve(request.id, &admin, "ok").await?;

    assert_eq!(outcome.request.status, SignupStatus::Approved);
    assert_eq!(outcome.request.decided_by, Some(admin.id));
    assert_eq!(outcome.request.decision_note, "ok");
    assert!(outcome.request.decision_fields_consistent());

    let account = outcome.account.expect("approval must create the account");
    assert_eq!(account.username, "alice");
    assert_eq!(account.email, "alice@example.com");
    assert_eq!(account.role, Role::User);

    // The temp password is usable against the stored hash.
    let temp = outcome.temp_password.expect("fresh credential policy");
    let stored = directory
        .find_by_username("alice")
        .await?
        .expect("account exists");
    assert!(verify_password(&temp, &stored.password_hash)?);

    // Approving again re-stamps but never creates a second account.
    let second = workflow.approve(request.id, &admin, "still ok").await?;
    assert!(second.account.is_none());
    assert!(second.temp_password.is_none());
    assert_eq!(second.request.decision_note, "still ok");

    let accounts: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM accounts WHERE username = 'alice'")
            .fetch_one(&pool)
            .await?;
    assert_eq!(accounts, 1);

    Ok(())
}

#[tokio::test]
async fn reject_after_approve_keeps_the_account() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let directory = Arc::new(SqliteDirectory::new(pool.clone()));
    let workflow = SignupWorkflow::new(pool.clone(), directory.clone());
    let admin = seed_account(&directory, "root", "root@example.com", Role::EnvAdmin).await?;
    let reviewer = seed_account(&directory, "rev", "rev@example.com", Role::WebAdmin).await?;

    let request = workflow
        .submit(submission("alice@example.com", "Alice Doe"))
        .await?;

    workflow.approve(request.id, &admin, "ok").await?;

    let rejected = workflow
        .reject(request.id, &reviewer, "changed our mind")
        .await?;

    assert_eq!(rejected.status, SignupStatus::Rejected);
    assert_eq!(rejected.decided_by, Some(reviewer.id));
    assert!(rejected.decision_fields_consistent());

    // The account created by the earlier approval is untouched.
    let alice = directory
        .find_by_username("alice")
        .await?
        .expect("account survives rejection");
    assert!(alice.active);
    assert_eq!(alice.role, Role::User);

    Ok(())
}

#[tokio::test]
async fn reset_clears_decision_metadata() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let directory = Arc::new(SqliteDirectory::new(pool.clone()));
    let workflow = SignupWorkflow::new(pool.clone(), directory.clone());
    let admin = seed_account(&directory, "root", "root@example.com", Role::EnvAdmin).await?;

    let request = workflow
        .submit(submission("alice@example.com", "Alice Doe"))
        .await?;

    workflow.approve(request.id, &admin, "ok").await?;

    let reset = workflow.reset_to_pending(request.id).await?;

    assert_eq!(reset.status, SignupStatus::Pending);
    assert!(reset.decided_at.is_none());
    assert!(reset.decided_by.is_none());
    assert_eq!(reset.decision_note, "");
    assert!(reset.decision_fields_consistent());

    // Reset never deletes or deactivates the account approval created.
    let alice = directory
        .find_by_username("alice")
        .await?
        .expect("account survives reset");
    assert!(alice.active);

    Ok(())
}

#[tokio::test]
async fn reuse_request_hash_policy_keeps_the_submitted_credential() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let directory = Arc::new(SqliteDirectory::new(pool.clone()));
    let workflow = SignupWorkflow::new(pool.clone(), directory.clone())
        .with_credential_policy(CredentialPolicy::ReuseRequestHash);
    let admin = seed_account(&directory, "root", "root@example.com", Role::EnvAdmin).await?;

    let request = workflow
        .submit(submission("alice@example.com", "Alice Doe"))
        .await?;

    let outcome = workflow.approve(request.id, &admin, "").await?;

    assert!(outcome.temp_password.is_none());
    let alice = directory
        .find_by_username("alice")
        .await?
        .expect("account exists");
    // The password captured at submission time still authenticates.
    assert!(verify_password("password123", &alice.password_hash)?);

    Ok(())
}

#[tokio::test]
async fn unknown_request_ids_are_not_found() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let directory = Arc::new(SqliteDirectory::new(pool.clone()));
    let workflow = SignupWorkflow::new(pool.clone(), directory.clone());
    let admin = seed_account(&directory, "root", "root@example.com", Role::EnvAdmin).await?;

    let missing = uuid::Uuid::new_v4();
    let err = workflow
        .approve(missing, &admin, "")
        .await
        .expect_err("approving a missing request must fail");
    assert!(matches!(err, AppError::NotFound(_)));

    let err = workflow
        .reset_to_pending(missing)
        .await
        .expect_err("resetting a missing request must fail");
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}
