use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthAccount;
use crate::models::account::{Account, AuthResponse, DbAccount, LoginRequest};
use crate::routes::current_account;
use crate::utils::verify_password;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub account: Account,
    /// Role the account is currently acting with.
    pub role: Role,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_account: DbAccount = state
        .directory
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !db_account.active {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let password_ok = verify_password(&payload.password, &db_account.password_hash)?;
    if !password_ok {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    // A stale role must not survive into the new session.
    state.sessions.invalidate(db_account.id).await;

    let token = state.jwt.encode(db_account.id)?;
    let account: Account = db_account.try_into()?;

    log_activity(&state.event_bus, "login", Some(account.id), &account);

    Ok(Json(AuthResponse { token, account }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current account with its acting role", body = MeResponse)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthAccount) -> AppResult<Json<MeResponse>> {
    let account = current_account(&state, auth.account_id).await?;
    let role = state.sessions.current_role(auth.account_id).await?;
    Ok(Json(MeResponse { account, role }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged")),
    security(("bearerAuth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> AppResult<Json<MessageResponse>> {
    state.sessions.invalidate(auth.account_id).await;
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}
