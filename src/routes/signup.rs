use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context, RequestContext};
use crate::jwt::AuthAccount;
use crate::models::signup::{
    ApproveResponse, DbSignupRequest, DecisionRequest, SignupRequest, SignupStatus,
    SubmitSignupRequest,
};
use crate::routes::current_account;

const REQUEST_COLUMNS: &str = "id, email, full_name, note, credential_hash, status, created_at, \
                               decided_at, decided_by, decision_note";

#[derive(Debug, Deserialize, IntoParams)]
pub struct RequestFilter {
    /// Restrict to one status: pending, approved or rejected.
    pub status: Option<String>,
}

#[utoipa::path(
    post,
    path = "/signup",
    tag = "Signup",
    request_body = SubmitSignupRequest,
    responses(
        (status = 201, description = "Request filed", body = SignupRequest),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<SubmitSignupRequest>,
) -> AppResult<(StatusCode, Json<SignupRequest>)> {
    let request = state.workflow.submit(payload).await?;

    log_activity(&state.event_bus, "submitted", None, &request);

    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/admin/requests",
    tag = "Admin",
    params(RequestFilter),
    responses(
        (status = 200, description = "Signup requests, newest first", body = Vec<SignupRequest>),
        (status = 403, description = "Administrator role required")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    auth: AuthAccount,
    Query(filter): Query<RequestFilter>,
) -> AppResult<Json<Vec<SignupRequest>>> {
    let role = state.sessions.current_role(auth.account_id).await?;
    authz::require_admin_like(role)?;

    let status = match filter.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            SignupStatus::parse(raw)
                .ok_or_else(|| AppError::bad_request(format!("unknown status '{raw}'")))?,
        ),
    };

    let rows: Vec<DbSignupRequest> = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {REQUEST_COLUMNS} FROM signup_requests WHERE status = ? ORDER BY created_at DESC"
            );
            sqlx::query_as(&sql).bind(status).fetch_all(&state.pool).await?
        }
        None => {
            let sql =
                format!("SELECT {REQUEST_COLUMNS} FROM signup_requests ORDER BY created_at DESC");
            sqlx::query_as(&sql).fetch_all(&state.pool).await?
        }
    };

    let requests = rows
        .into_iter()
        .map(SignupRequest::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/admin/requests/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Signup request ID")),
    responses(
        (status = 200, description = "Signup request detail", body = SignupRequest),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(state): State<AppState>,
    auth: AuthAccount,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SignupRequest>> {
    let role = state.sessions.current_role(auth.account_id).await?;
    authz::require_admin_like(role)?;

    let request: SignupRequest = state.workflow.load(id).await?.try_into()?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/admin/requests/{id}/approve",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Signup request ID")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Request approved", body = ApproveResponse),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn approve_request(
    State(state): State<AppState>,
    auth: AuthAccount,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecisionRequest>,
) -> AppResult<Json<ApproveResponse>> {
    let actor = current_account(&state, auth.account_id).await?;
    let role = state.sessions.current_role(auth.account_id).await?;
    authz::require_admin_like(role)?;

    let outcome = state
        .workflow
        .approve(id, &actor, &payload.decision_note)
        .await?;

    let context = RequestContext::from_headers(&headers);
    log_activity_with_context(
        &state.event_bus,
        "approved",
        Some(actor.id),
        &outcome.request,
        None,
        Some(context.clone()),
    );
    if let Some(account) = &outcome.account {
        log_activity_with_context(
            &state.event_bus,
            "created",
            Some(actor.id),
            account,
            None,
            Some(context),
        );
    }

    Ok(Json(ApproveResponse {
        request: outcome.request,
        account: outcome.account,
        temp_password: outcome.temp_password,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/requests/{id}/reject",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Signup request ID")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Request rejected", body = SignupRequest),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn reject_request(
    State(state): State<AppState>,
    auth: AuthAccount,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecisionRequest>,
) -> AppResult<Json<SignupRequest>> {
    let actor = current_account(&state, auth.account_id).await?;
    let role = state.sessions.current_role(auth.account_id).await?;
    authz::require_admin_like(role)?;

    let request = state
        .workflow
        .reject(id, &actor, &payload.decision_note)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "rejected",
        Some(actor.id),
        &request,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/admin/requests/{id}/reset",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Signup request ID")),
    responses(
        (status = 200, description = "Request reset to pending", body = SignupRequest),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn reset_request(
    State(state): State<AppState>,
    auth: AuthAccount,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SignupRequest>> {
    let actor = current_account(&state, auth.account_id).await?;
    let role = state.sessions.current_role(auth.account_id).await?;
    authz::require_admin_like(role)?;

    let request = state.workflow.reset_to_pending(id).await?;

    log_activity_with_context(
        &state.event_bus,
        "reset",
        Some(actor.id),
        &request,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(request))
}
