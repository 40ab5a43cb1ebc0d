//! Deploy-time provisioning of ENV_ADMIN accounts.
//!
//! This is the only code path that writes the ENV_ADMIN role. It reads the
//! process environment and talks straight to the store, bypassing the
//! permission engine on purpose: the engine forbids granting ENV_ADMIN to
//! anything reachable from the API.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppResult;
use crate::utils::{hash_password, utc_now};

#[derive(Debug, Clone)]
pub struct AdminSpec {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Parse `APP_ADMINS="username:email:password,..."`; fall back to the legacy
/// `ADMIN_USERNAME` / `ADMIN_EMAIL` / `ADMIN_PASSWORD` triple.
pub fn admin_specs_from_env() -> Vec<AdminSpec> {
    let configured = std::env::var("APP_ADMINS").unwrap_or_default();

    if configured.trim().is_empty() {
        return legacy_admin_spec().into_iter().collect();
    }

    let mut specs = Vec::new();
    for entry in configured.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let parts: Vec<&str> = entry.split(':').collect();
        if parts.len() != 3 {
            tracing::warn!(%entry, "skipping admin entry, expected username:email:password");
            continue;
        }

        specs.push(AdminSpec {
            username: parts[0].to_string(),
            email: parts[1].to_string(),
            password: parts[2].to_string(),
        });
    }
    specs
}

fn legacy_admin_spec() -> Option<AdminSpec> {
    let username = std::env::var("ADMIN_USERNAME").ok()?;
    let email = std::env::var("ADMIN_EMAIL").ok()?;
    let password = std::env::var("ADMIN_PASSWORD").ok()?;
    Some(AdminSpec {
        username,
        email,
        password,
    })
}

/// Create or refresh every configured ENV_ADMIN account. Existing accounts
/// keep their id; email, credential and active flag are overwritten so the
/// environment stays the source of truth for these identities.
pub async fn setup_admins(pool: &SqlitePool) -> AppResult<usize> {
    let specs = admin_specs_from_env();
    if specs.is_empty() {
        tracing::info!("no admin provisioning configured");
        return Ok(0);
    }

    let mut provisioned = 0;
    for spec in specs {
        let password_hash = hash_password(&spec.password)?;
        let now = utc_now();

        let existing: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM accounts WHERE username = ?")
                .bind(&spec.username)
                .fetch_optional(pool)
                .await?;

        match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE accounts SET email = ?, role = ?, password_hash = ?, active = 1, updated_at = ? \
                     WHERE id = ?",
                )
                .bind(&spec.email)
                .bind(Role::EnvAdmin)
                .bind(&password_hash)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await?;
                tracing::info!(username = %spec.username, "env admin refreshed");
            }
            None => {
                sqlx::query(
                    "INSERT INTO accounts (id, username, email, display_name, role, password_hash, active, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
                )
                .bind(Uuid::new_v4())
                .bind(&spec.username)
                .bind(&spec.email)
                .bind(&spec.username)
                .bind(Role::EnvAdmin)
                .bind(&password_hash)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await?;
                tracing::info!(username = %spec.username, "env admin created");
            }
        }
        provisioned += 1;
    }

    Ok(provisioned)
}
