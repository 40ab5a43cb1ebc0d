use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::directory::{AccountDirectory, SqliteDirectory};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jitsi::JitsiConfig;
use crate::jwt::JwtConfig;
use crate::routes::{accounts, auth, health, meetings, signup};
use crate::session::SessionAuthContext;
use crate::workflow::SignupWorkflow;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub jitsi: Arc<JitsiConfig>,
    pub directory: Arc<dyn AccountDirectory>,
    pub sessions: Arc<SessionAuthContext>,
    pub workflow: Arc<SignupWorkflow>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, jitsi: JitsiConfig, event_bus: EventBus) -> Self {
        let directory: Arc<dyn AccountDirectory> = Arc::new(SqliteDirectory::new(pool.clone()));
        let sessions = Arc::new(SessionAuthContext::new(directory.clone()));
        let workflow = Arc::new(SignupWorkflow::new(pool.clone(), directory.clone()));

        Self {
            pool,
            jwt: Arc::new(jwt),
            jitsi: Arc::new(jitsi),
            directory,
            sessions,
            workflow,
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let jitsi_config = JitsiConfig::from_env();

    let (event_bus, event_rx) = init_event_bus();
    tokio::spawn(start_activity_listener(event_rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, jitsi_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let admin_routes = Router::new()
        .route("/requests", get(signup::list_requests))
        .route("/requests/:id", get(signup::get_request))
        .route("/requests/:id/approve", post(signup::approve_request))
        .route("/requests/:id/reject", post(signup::reject_request))
        .route("/requests/:id/reset", post(signup::reset_request))
        .route("/users", get(accounts::list_accounts))
        .route("/users/:id/role", put(accounts::change_role))
        .route("/users/:id/active", put(accounts::set_active))
        .route("/users/:id", delete(accounts::delete_account))
        .route("/stats", get(accounts::admin_stats));

    let meeting_routes = Router::new()
        .route("/", get(meetings::list_meetings))
        .route("/", post(meetings::create_meeting))
        .route("/:id", get(meetings::get_meeting));

    let router = Router::new()
        .route("/health", get(health::health))
        .route("/signup", post(signup::submit))
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .nest("/meetings", meeting_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
