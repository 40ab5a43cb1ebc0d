use serde_json::json;
use utoipa::OpenApi;

use crate::authz;
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::signup::submit,
        routes::signup::list_requests,
        routes::signup::get_request,
        routes::signup::approve_request,
        routes::signup::reject_request,
        routes::signup::reset_request,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::accounts::list_accounts,
        routes::accounts::change_role,
        routes::accounts::set_active,
        routes::accounts::delete_account,
        routes::accounts::admin_stats,
        routes::meetings::create_meeting,
        routes::meetings::list_meetings,
        routes::meetings::get_meeting,
    ),
    components(
        schemas(
            authz::Role,
            models::account::Account,
            models::account::AuthResponse,
            models::account::LoginRequest,
            models::account::ChangeRoleRequest,
            models::account::SetActiveRequest,
            models::account::AccountPage,
            models::signup::SignupStatus,
            models::signup::SignupRequest,
            models::signup::SubmitSignupRequest,
            models::signup::DecisionRequest,
            models::signup::ApproveResponse,
            models::signup::RequestStats,
            models::meeting::Meeting,
            models::meeting::MeetingCreateRequest,
            models::meeting::MeetingResponse,
            routes::health::HealthResponse,
            routes::auth::MeResponse,
            routes::auth::MessageResponse,
            routes::accounts::AdminStats
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Signup", description = "Public signup requests"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Admin", description = "Request review and account management"),
        (name = "Meetings", description = "Jitsi meeting management")
    )
)]
pub struct ApiDoc;

/// OpenAPI document with the bearer scheme and a default server injected.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
    let mut doc = serde_json::to_value(ApiDoc::openapi())?;

    if let Some(components) = doc.pointer_mut("/components").and_then(|c| c.as_object_mut()) {
        components
            .entry("securitySchemes")
            .or_insert_with(|| json!({}));
    }
    if let Some(schemes) = doc
        .pointer_mut("/components/securitySchemes")
        .and_then(|s| s.as_object_mut())
    {
        schemes.insert(
            "bearerAuth".to_string(),
            json!({
                "type": "http",
                "scheme": "bearer",
                "bearerFormat": "JWT"
            }),
        );
    }

    if doc.get("servers").is_none() {
        doc["servers"] = json!([{ "url": format!("http://localhost:{}", port) }]);
    }

    Ok(serde_json::from_value(doc)?)
}
