use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::account::Account;

/// Lifecycle of a signup request. No state is terminal: approved and
/// rejected requests can both be reset back to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
pub enum SignupStatus {
    #[serde(rename = "pending")]
    #[sqlx(rename = "pending")]
    Pending,
    #[serde(rename = "approved")]
    #[sqlx(rename = "approved")]
    Approved,
    #[serde(rename = "rejected")]
    #[sqlx(rename = "rejected")]
    Rejected,
}

impl SignupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignupStatus::Pending => "pending",
            SignupStatus::Approved => "approved",
            SignupStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<SignupStatus> {
        match value {
            "pending" => Some(SignupStatus::Pending),
            "approved" => Some(SignupStatus::Approved),
            "rejected" => Some(SignupStatus::Rejected),
            _ => None,
        }
    }
}

/// An unauthenticated party's application for an account. The stored
/// credential hash never leaves the database through this view.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub note: String,
    pub status: SignupStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<Uuid>,
    pub decision_note: String,
}

impl SignupRequest {
    /// Pending is exactly the state with no decision metadata.
    pub fn decision_fields_consistent(&self) -> bool {
        let pending = self.status == SignupStatus::Pending;
        pending == self.decided_at.is_none() && pending == self.decided_by.is_none()
    }
}

impl crate::events::Loggable for SignupRequest {
    fn entity_type() -> &'static str {
        "signup_request"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSignupRequest {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub note: String,
    pub credential_hash: String,
    pub status: SignupStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<Uuid>,
    pub decision_note: String,
}

impl TryFrom<DbSignupRequest> for SignupRequest {
    type Error = AppError;

    fn try_from(value: DbSignupRequest) -> Result<Self, Self::Error> {
        Ok(SignupRequest {
            id: value.id,
            email: value.email,
            full_name: value.full_name,
            note: value.note,
            status: value.status,
            created_at: value.created_at,
            decided_at: value.decided_at,
            decided_by: value.decided_by,
            decision_note: value.decision_note,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitSignupRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "Alice Doe")]
    pub full_name: String,
    #[schema(example = "Team lead, needs meeting rooms")]
    #[serde(default)]
    pub note: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionRequest {
    #[schema(example = "ok")]
    #[serde(default)]
    pub decision_note: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApproveResponse {
    pub request: SignupRequest,
    /// Present when this approval created the account.
    pub account: Option<Account>,
    /// Temporary password, shown exactly once. Only its hash is stored.
    pub temp_password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestStats {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}
