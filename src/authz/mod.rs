//! Authorization module - role catalog and permission predicates
//!
//! Roles form a fixed hierarchy: ENV_ADMIN > WEB_ADMIN > {USER, GUEST}.
//! USER and GUEST are never compared against each other directly.
//! ENV_ADMIN is provisioned from the deploy environment only; no predicate
//! in this module ever grants it.

mod engine;

pub use engine::{
    can_change_role, can_create_or_assign_role, can_delete_account, require_admin_like,
    require_registered,
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The single authorization attribute of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
pub enum Role {
    #[serde(rename = "ENV_ADMIN")]
    #[sqlx(rename = "ENV_ADMIN")]
    EnvAdmin,
    #[serde(rename = "WEB_ADMIN")]
    #[sqlx(rename = "WEB_ADMIN")]
    WebAdmin,
    #[serde(rename = "USER")]
    #[sqlx(rename = "USER")]
    User,
    #[serde(rename = "GUEST")]
    #[sqlx(rename = "GUEST")]
    Guest,
}

/// Roles an administrator may hand out. ENV_ADMIN is deliberately absent.
pub const ASSIGNABLE_ROLES: [Role; 3] = [Role::WebAdmin, Role::User, Role::Guest];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::EnvAdmin => "ENV_ADMIN",
            Role::WebAdmin => "WEB_ADMIN",
            Role::User => "USER",
            Role::Guest => "GUEST",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "ENV_ADMIN" => Some(Role::EnvAdmin),
            "WEB_ADMIN" => Some(Role::WebAdmin),
            "USER" => Some(Role::User),
            "GUEST" => Some(Role::Guest),
            _ => None,
        }
    }

    /// ENV_ADMIN or WEB_ADMIN: the threshold for administrative operations.
    pub fn is_admin_like(&self) -> bool {
        matches!(self, Role::EnvAdmin | Role::WebAdmin)
    }

    /// Everyone except GUEST: the threshold for creating meetings.
    pub fn is_registered(&self) -> bool {
        !matches!(self, Role::Guest)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
