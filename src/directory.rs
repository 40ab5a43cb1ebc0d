use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::models::account::{DbAccount, NewAccount};
use crate::utils::utc_now;

/// Directory of application accounts. The workflow and the admin handlers
/// talk to accounts only through this seam.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<DbAccount>>;
    async fn find_by_username(&self, username: &str) -> AppResult<Option<DbAccount>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<DbAccount>>;
    /// Page of accounts plus the unpaged total, newest first.
    async fn list(&self, page: i64, per_page: i64) -> AppResult<(Vec<DbAccount>, i64)>;
    async fn create(&self, new: NewAccount) -> AppResult<DbAccount>;
    async fn set_role(&self, id: Uuid, role: Role) -> AppResult<()>;
    async fn set_active(&self, id: Uuid, active: bool) -> AppResult<()>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// sqlx-backed directory. Uniqueness of username and email is enforced by
/// the schema, so concurrent writers race on the constraint, not on a lock.
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, username, email, display_name, role, password_hash, active, created_at, updated_at";

#[async_trait]
impl AccountDirectory for SqliteDirectory {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<DbAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?");
        let account = sqlx::query_as::<_, DbAccount>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<DbAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?");
        let account = sqlx::query_as::<_, DbAccount>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<DbAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?");
        let account = sqlx::query_as::<_, DbAccount>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn list(&self, page: i64, per_page: i64) -> AppResult<(Vec<DbAccount>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM accounts")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        let items = sqlx::query_as::<_, DbAccount>(&sql)
            .bind(per_page)
            .bind((page - 1).max(0) * per_page)
            .fetch_all(&self.pool)
            .await?;

        Ok((items, total))
    }

    async fn create(&self, new: NewAccount) -> AppResult<DbAccount> {
        let id = Uuid::new_v4();
        let now = utc_now();

        let result = sqlx::query(
            "INSERT INTO accounts (id, username, email, display_name, role, password_hash, active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.display_name)
        .bind(new.role)
        .bind(&new.password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            // A concurrent writer won the username/email slot; surface the
            // loss instead of retrying.
            if let Some(db_err) = err.as_database_error() {
                if db_err.is_unique_violation() {
                    return Err(AppError::conflict(format!(
                        "account '{}' already exists",
                        new.username
                    )));
                }
            }
            return Err(err.into());
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::internal("account vanished after insert"))
    }

    async fn set_role(&self, id: Uuid, role: Role) -> AppResult<()> {
        let result = sqlx::query("UPDATE accounts SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role)
            .bind(utc_now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("account not found"));
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> AppResult<()> {
        let result = sqlx::query("UPDATE accounts SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(utc_now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("account not found"));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("account not found"));
        }
        Ok(())
    }
}
