use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthAccount;
use crate::models::account::{Account, AccountPage, ChangeRoleRequest, SetActiveRequest};
use crate::models::signup::RequestStats;
use crate::routes::current_account;

#[derive(Debug, Deserialize, IntoParams)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    params(Pagination),
    responses(
        (status = 200, description = "Page of accounts", body = AccountPage),
        (status = 403, description = "Administrator role required")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_accounts(
    State(state): State<AppState>,
    auth: AuthAccount,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<AccountPage>> {
    let role = state.sessions.current_role(auth.account_id).await?;
    authz::require_admin_like(role)?;

    let page = pagination.page.unwrap_or(1).max(1);
    let per_page = pagination.per_page.unwrap_or(20).clamp(1, 100);

    let (rows, total) = state.directory.list(page, per_page).await?;
    let items = rows
        .into_iter()
        .map(Account::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(AccountPage {
        items,
        total,
        page,
        per_page,
    }))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Account ID")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = Account),
        (status = 403, description = "Not allowed for this actor/target/role combination"),
        (status = 404, description = "Account not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_role(
    State(state): State<AppState>,
    auth: AuthAccount,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeRoleRequest>,
) -> AppResult<Json<Account>> {
    let actor = current_account(&state, auth.account_id).await?;
    let actor_role = state.sessions.current_role(auth.account_id).await?;
    authz::require_admin_like(actor_role)?;

    let target = state
        .directory
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("account not found"))?;
    let old: Account = target.clone().try_into()?;

    if !authz::can_change_role(actor_role, target.role, payload.role) {
        let message = if target.role == Role::EnvAdmin {
            "the ENV_ADMIN role cannot be changed from the application"
        } else if payload.role == Role::EnvAdmin {
            "the ENV_ADMIN role can only be assigned at deploy time"
        } else {
            "you are not allowed to assign this role"
        };
        return Err(AppError::forbidden(message));
    }

    state.directory.set_role(id, payload.role).await?;
    // The new role applies from the target's next role resolution.
    state.sessions.invalidate(id).await;

    let updated: Account = state
        .directory
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("account not found"))?
        .try_into()?;

    log_activity_with_context(
        &state.event_bus,
        "role_changed",
        Some(actor.id),
        &updated,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(updated))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/active",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Account ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Active flag updated", body = Account),
        (status = 403, description = "Not allowed for this actor/target combination"),
        (status = 404, description = "Account not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn set_active(
    State(state): State<AppState>,
    auth: AuthAccount,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> AppResult<Json<Account>> {
    let actor = current_account(&state, auth.account_id).await?;
    let actor_role = state.sessions.current_role(auth.account_id).await?;
    authz::require_admin_like(actor_role)?;

    let target = state
        .directory
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("account not found"))?;
    let old: Account = target.clone().try_into()?;

    // Suspending an account is gated like deleting it.
    if !authz::can_delete_account(actor_role, target.role) {
        return Err(AppError::forbidden(
            "you are not allowed to manage this account",
        ));
    }

    state.directory.set_active(id, payload.active).await?;
    state.sessions.invalidate(id).await;

    let updated: Account = state
        .directory
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("account not found"))?
        .try_into()?;

    let action = if payload.active { "activated" } else { "deactivated" };
    log_activity_with_context(
        &state.event_bus,
        action,
        Some(actor.id),
        &updated,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 403, description = "Not allowed for this actor/target combination"),
        (status = 404, description = "Account not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_account(
    State(state): State<AppState>,
    auth: AuthAccount,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let actor = current_account(&state, auth.account_id).await?;
    let actor_role = state.sessions.current_role(auth.account_id).await?;
    authz::require_admin_like(actor_role)?;

    let target = state
        .directory
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("account not found"))?;
    let deleted: Account = target.clone().try_into()?;

    if !authz::can_delete_account(actor_role, target.role) {
        let message = if target.role == Role::EnvAdmin {
            "ENV_ADMIN accounts cannot be deleted from the application"
        } else {
            "you are not allowed to delete this account"
        };
        return Err(AppError::forbidden(message));
    }

    state.directory.delete(id).await?;
    state.sessions.invalidate(id).await;

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(actor.id),
        &deleted,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminStats {
    pub accounts_by_role: HashMap<String, i64>,
    pub requests: RequestStats,
    pub total_meetings: i64,
}

#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "Admin",
    responses(
        (status = 200, description = "Dashboard counters", body = AdminStats),
        (status = 403, description = "Administrator role required")
    ),
    security(("bearerAuth" = []))
)]
pub async fn admin_stats(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> AppResult<Json<AdminStats>> {
    let role = state.sessions.current_role(auth.account_id).await?;
    authz::require_admin_like(role)?;

    let mut accounts_by_role = HashMap::new();
    let role_rows = sqlx::query("SELECT role, COUNT(1) as count FROM accounts GROUP BY role")
        .fetch_all(&state.pool)
        .await?;
    for row in role_rows {
        let role: String = row.get("role");
        let count: i64 = row.get("count");
        accounts_by_role.insert(role, count);
    }

    let mut by_status: HashMap<String, i64> = HashMap::new();
    let status_rows =
        sqlx::query("SELECT status, COUNT(1) as count FROM signup_requests GROUP BY status")
            .fetch_all(&state.pool)
            .await?;
    for row in status_rows {
        let status: String = row.get("status");
        let count: i64 = row.get("count");
        by_status.insert(status, count);
    }

    let requests = RequestStats {
        total: by_status.values().sum(),
        pending: by_status.get("pending").copied().unwrap_or(0),
        approved: by_status.get("approved").copied().unwrap_or(0),
        rejected: by_status.get("rejected").copied().unwrap_or(0),
    };

    let total_meetings: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM meetings")
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(AdminStats {
        accounts_by_role,
        requests,
        total_meetings,
    }))
}
