use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppError;

/// An authenticatable identity. Carries exactly one role at a time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Loggable for Account {
    fn entity_type() -> &'static str {
        "account"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
    fn severity(&self) -> crate::events::Severity {
        // Account mutations are always role-sensitive.
        crate::events::Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbAccount> for Account {
    type Error = AppError;

    fn try_from(value: DbAccount) -> Result<Self, Self::Error> {
        Ok(Account {
            id: value.id,
            username: value.username,
            email: value.email,
            display_name: value.display_name,
            role: value.role,
            active: value.active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// Input for creating an account through the directory. The credential is an
/// argon2 PHC string; plaintext never reaches the directory.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub account: Account,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeRoleRequest {
    #[schema(example = "USER")]
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountPage {
    pub items: Vec<Account>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}
