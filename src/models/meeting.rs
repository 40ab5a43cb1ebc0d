use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Meeting {
    pub id: Uuid,
    pub room: String,
    pub owner_id: Uuid,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl Meeting {
    /// Random room slug, e.g. `room-4f9a01c2`.
    pub fn generate_room() -> String {
        let mut bytes = [0u8; 4];
        OsRng.fill_bytes(&mut bytes);
        format!("room-{}", hex::encode(bytes))
    }
}

impl crate::events::Loggable for Meeting {
    fn entity_type() -> &'static str {
        "meeting"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMeeting {
    pub id: Uuid,
    pub room: String,
    pub owner_id: Uuid,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbMeeting> for Meeting {
    type Error = AppError;

    fn try_from(value: DbMeeting) -> Result<Self, Self::Error> {
        Ok(Meeting {
            id: value.id,
            room: value.room,
            owner_id: value.owner_id,
            is_private: value.is_private,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MeetingCreateRequest {
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeetingResponse {
    pub meeting: Meeting,
    /// Fully built Jitsi link, with a room token appended when configured.
    pub link: String,
}
