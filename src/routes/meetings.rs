use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthAccount;
use crate::models::meeting::{DbMeeting, Meeting, MeetingCreateRequest, MeetingResponse};
use crate::routes::current_account;
use crate::utils::utc_now;

const MEETING_COLUMNS: &str = "id, room, owner_id, is_private, created_at";

#[utoipa::path(
    post,
    path = "/meetings",
    tag = "Meetings",
    request_body = MeetingCreateRequest,
    responses(
        (status = 201, description = "Meeting created", body = MeetingResponse),
        (status = 403, description = "Guests cannot create meetings")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_meeting(
    State(state): State<AppState>,
    auth: AuthAccount,
    Json(payload): Json<MeetingCreateRequest>,
) -> AppResult<(StatusCode, Json<MeetingResponse>)> {
    let actor = current_account(&state, auth.account_id).await?;
    let role = state.sessions.current_role(auth.account_id).await?;
    // GUEST may join with a link but never create.
    authz::require_registered(role)?;

    let id = Uuid::new_v4();
    let room = Meeting::generate_room();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO meetings (id, room, owner_id, is_private, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&room)
    .bind(actor.id)
    .bind(payload.is_private)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let meeting = Meeting {
        id,
        room,
        owner_id: actor.id,
        is_private: payload.is_private,
        created_at: now,
    };

    log_activity(&state.event_bus, "created", Some(actor.id), &meeting);

    let link = state.jitsi.meeting_link(&meeting.room, &display_name(&actor));
    Ok((
        StatusCode::CREATED,
        Json(MeetingResponse { meeting, link }),
    ))
}

#[utoipa::path(
    get,
    path = "/meetings",
    tag = "Meetings",
    responses((status = 200, description = "Meetings owned by the caller", body = Vec<Meeting>)),
    security(("bearerAuth" = []))
)]
pub async fn list_meetings(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> AppResult<Json<Vec<Meeting>>> {
    let actor = current_account(&state, auth.account_id).await?;

    let sql = format!(
        "SELECT {MEETING_COLUMNS} FROM meetings WHERE owner_id = ? ORDER BY created_at DESC"
    );
    let rows: Vec<DbMeeting> = sqlx::query_as(&sql)
        .bind(actor.id)
        .fetch_all(&state.pool)
        .await?;

    let meetings = rows
        .into_iter()
        .map(Meeting::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(meetings))
}

#[utoipa::path(
    get,
    path = "/meetings/{id}",
    tag = "Meetings",
    params(("id" = Uuid, Path, description = "Meeting ID")),
    responses(
        (status = 200, description = "Meeting with its join link", body = MeetingResponse),
        (status = 404, description = "Meeting not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_meeting(
    State(state): State<AppState>,
    auth: AuthAccount,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MeetingResponse>> {
    // Any authenticated role may join with a link, GUEST included.
    let actor = current_account(&state, auth.account_id).await?;

    let sql = format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = ?");
    let meeting: Meeting = sqlx::query_as::<_, DbMeeting>(&sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("meeting not found"))?
        .try_into()?;

    let link = state.jitsi.meeting_link(&meeting.room, &display_name(&actor));
    Ok(Json(MeetingResponse { meeting, link }))
}

fn display_name(account: &crate::models::account::Account) -> String {
    if account.display_name.is_empty() {
        account.username.clone()
    } else {
        account.display_name.clone()
    }
}
