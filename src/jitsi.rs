//! Meeting-link building for the fronted Jitsi deployment.
//!
//! The deployment itself (Prosody, Jicofo, JVB) is external; this module only
//! produces the URL a participant follows, optionally carrying a room-scoped
//! token when the deployment enforces JWT auth.

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use serde::Serialize;

const ROOM_TOKEN_TTL_SECS: i64 = 60 * 30;

#[derive(Debug, Clone)]
pub struct JitsiConfig {
    pub base_url: String,
    pub app_id: String,
    /// When unset the deployment is open and links carry no token.
    pub jwt_secret: Option<Vec<u8>>,
}

impl JitsiConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("JITSI_BASE_URL")
                .unwrap_or_else(|_| "https://meet.jit.si".to_string()),
            app_id: std::env::var("JITSI_APP_ID").unwrap_or_else(|_| "meet-gate".to_string()),
            jwt_secret: std::env::var("JITSI_JWT_SECRET")
                .ok()
                .map(String::into_bytes),
        }
    }

    /// Link a participant follows into `room`, as `{base}/{room}` with a
    /// `?jwt=` room token appended when the deployment requires one.
    pub fn meeting_link(&self, room: &str, display_name: &str) -> String {
        match self.room_token(room, display_name) {
            Some(token) => format!("{}/{}?jwt={}", self.base_url, room, token),
            None => format!("{}/{}", self.base_url, room),
        }
    }

    fn room_token(&self, room: &str, display_name: &str) -> Option<String> {
        let secret = self.jwt_secret.as_ref()?;

        let now = Utc::now().timestamp();
        let claims = RoomClaims {
            aud: &self.app_id,
            iss: &self.app_id,
            sub: "meet",
            room,
            exp: now + ROOM_TOKEN_TTL_SECS,
            nbf: now - 5,
            context: RoomContext {
                user: RoomUser { name: display_name },
            },
        };

        match jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)) {
            Ok(token) => Some(token),
            Err(err) => {
                tracing::warn!("failed to sign room token: {err}");
                None
            }
        }
    }
}

#[derive(Serialize)]
struct RoomClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    room: &'a str,
    exp: i64,
    nbf: i64,
    context: RoomContext<'a>,
}

#[derive(Serialize)]
struct RoomContext<'a> {
    user: RoomUser<'a>,
}

#[derive(Serialize)]
struct RoomUser<'a> {
    name: &'a str,
}
