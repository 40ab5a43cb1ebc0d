use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::directory::AccountDirectory;
use crate::errors::{AppError, AppResult};
use crate::models::account::{Account, NewAccount};
use crate::models::signup::{DbSignupRequest, SignupRequest, SignupStatus, SubmitSignupRequest};
use crate::authz::Role;
use crate::utils::{generate_temp_password, hash_password, username_from_email, utc_now};

/// What an approved request's account is credentialed with.
///
/// The original deployments disagreed: one reused the hash stored on the
/// request, the other minted a temporary password and showed it to the
/// approving admin. Both behaviors are kept selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialPolicy {
    /// Generate a fresh temporary password; only its hash is stored and the
    /// plaintext is returned once to the caller.
    #[default]
    FreshTemporary,
    /// Reuse the credential hash captured at submission time.
    ReuseRequestHash,
}

#[derive(Debug)]
pub struct ApproveOutcome {
    pub request: SignupRequest,
    /// The account this approval created, if any.
    pub account: Option<Account>,
    /// Plaintext temporary password under `CredentialPolicy::FreshTemporary`,
    /// only when an account was created.
    pub temp_password: Option<String>,
}

/// State machine over signup requests: pending -> approved/rejected, with an
/// explicit reset back to pending. Decisions stamp who/when/why onto the row;
/// approval may create the account as a side effect.
///
/// Callers are expected to have passed `require_admin_like` for every
/// operation except `submit`.
pub struct SignupWorkflow {
    pool: SqlitePool,
    directory: Arc<dyn AccountDirectory>,
    credential_policy: CredentialPolicy,
}

const REQUEST_COLUMNS: &str = "id, email, full_name, note, credential_hash, status, created_at, \
                               decided_at, decided_by, decision_note";

impl SignupWorkflow {
    pub fn new(pool: SqlitePool, directory: Arc<dyn AccountDirectory>) -> Self {
        Self {
            pool,
            directory,
            credential_policy: CredentialPolicy::default(),
        }
    }

    pub fn with_credential_policy(mut self, policy: CredentialPolicy) -> Self {
        self.credential_policy = policy;
        self
    }

    /// File a new request. Fails with `DuplicateEmail` when the address is
    /// already held by a request or an account. Never creates an account.
    pub async fn submit(&self, submission: SubmitSignupRequest) -> AppResult<SignupRequest> {
        let email = submission.email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::bad_request("a valid email address is required"));
        }

        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM signup_requests WHERE email = ?")
                .bind(&email)
                .fetch_one(&self.pool)
                .await?;
        if taken > 0 || self.directory.find_by_email(&email).await?.is_some() {
            return Err(AppError::duplicate_email(email));
        }

        // The plaintext dies here; everything downstream sees the hash only.
        let credential_hash = hash_password(&submission.password)?;

        let id = Uuid::new_v4();
        let now = utc_now();
        let insert = sqlx::query(
            "INSERT INTO signup_requests (id, email, full_name, note, credential_hash, status, created_at, decision_note) \
             VALUES (?, ?, ?, ?, ?, ?, ?, '')",
        )
        .bind(id)
        .bind(&email)
        .bind(submission.full_name.trim())
        .bind(&submission.note)
        .bind(&credential_hash)
        .bind(SignupStatus::Pending)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(err) = insert {
            // Lost a race with another submission for the same address.
            if let Some(db_err) = err.as_database_error() {
                if db_err.is_unique_violation() {
                    return Err(AppError::duplicate_email(email));
                }
            }
            return Err(err.into());
        }

        tracing::info!(%email, "signup request submitted");
        self.load(id).await?.try_into()
    }

    /// Approve a request, stamping the decision metadata, and create the
    /// account if the derived username is still free. Re-approving only
    /// re-stamps; it never creates a second account.
    pub async fn approve(
        &self,
        request_id: Uuid,
        decider: &Account,
        decision_note: &str,
    ) -> AppResult<ApproveOutcome> {
        let request = self.load(request_id).await?;

        self.stamp_decision(request_id, SignupStatus::Approved, decider.id, decision_note)
            .await?;

        let username = username_from_email(&request.email);
        let mut created = None;
        let mut temp_password = None;

        if self.directory.find_by_username(&username).await?.is_none() {
            let password_hash = match self.credential_policy {
                CredentialPolicy::FreshTemporary => {
                    let plain = generate_temp_password();
                    let hash = hash_password(&plain)?;
                    temp_password = Some(plain);
                    hash
                }
                CredentialPolicy::ReuseRequestHash => request.credential_hash.clone(),
            };

            let account = self
                .directory
                .create(NewAccount {
                    username: username.clone(),
                    email: request.email.clone(),
                    display_name: request.full_name.clone(),
                    role: Role::User,
                    password_hash,
                })
                .await?;

            tracing::info!(%username, email = %request.email, "account created from signup request");
            created = Some(account.try_into()?);
        }

        Ok(ApproveOutcome {
            request: self.load(request_id).await?.try_into()?,
            account: created,
            temp_password,
        })
    }

    /// Reject a request, stamping the decision metadata. Never touches
    /// accounts, including one a previous approval created.
    pub async fn reject(
        &self,
        request_id: Uuid,
        decider: &Account,
        decision_note: &str,
    ) -> AppResult<SignupRequest> {
        self.load(request_id).await?;
        self.stamp_decision(request_id, SignupStatus::Rejected, decider.id, decision_note)
            .await?;
        self.load(request_id).await?.try_into()
    }

    /// Return a request to pending, clearing all decision metadata. Any
    /// account created by an earlier approval is left as it is.
    pub async fn reset_to_pending(&self, request_id: Uuid) -> AppResult<SignupRequest> {
        self.load(request_id).await?;

        sqlx::query(
            "UPDATE signup_requests SET status = ?, decided_at = NULL, decided_by = NULL, decision_note = '' \
             WHERE id = ?",
        )
        .bind(SignupStatus::Pending)
        .bind(request_id)
        .execute(&self.pool)
        .await?;

        self.load(request_id).await?.try_into()
    }

    pub async fn load(&self, request_id: Uuid) -> AppResult<DbSignupRequest> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM signup_requests WHERE id = ?");
        sqlx::query_as::<_, DbSignupRequest>(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("signup request not found"))
    }

    async fn stamp_decision(
        &self,
        request_id: Uuid,
        status: SignupStatus,
        decided_by: Uuid,
        decision_note: &str,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE signup_requests SET status = ?, decided_at = ?, decided_by = ?, decision_note = ? \
             WHERE id = ?",
        )
        .bind(status)
        .bind(utc_now())
        .bind(decided_by)
        .bind(decision_note)
        .bind(request_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
