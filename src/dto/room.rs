//! DTO definitions used by the room administration REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::RoomEntity,
    dto::{
        format_system_time,
        validation::{validate_display_name, validate_room_code},
    },
};

/// Payload for explicit room creation.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Desired code; a random one is generated when omitted.
    #[serde(default)]
    #[validate(custom(function = "validate_room_code"))]
    pub room_code: Option<String>,
    /// Identity that owns the room.
    #[validate(custom(function = "validate_display_name"))]
    pub host_name: String,
    /// Initial members; defaults to the host alone.
    #[serde(default)]
    pub users: Vec<String>,
}

/// Payload identifying the caller of a membership or host-only operation.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UsernameRequest {
    /// Display name of the caller.
    #[validate(custom(function = "validate_display_name"))]
    pub username: String,
}

/// Public projection of a room record.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    /// Canonical room code.
    pub room_code: String,
    /// Member key of the host.
    pub host_name: String,
    /// Registered members, host included.
    pub users: Vec<String>,
    /// Loaded video, if any.
    pub video_id: Option<String>,
    /// Playback position in seconds.
    pub current_time: f64,
    /// Whether the player is playing.
    pub is_playing: bool,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last activity.
    pub last_active: String,
}

impl From<RoomEntity> for RoomResponse {
    fn from(room: RoomEntity) -> Self {
        Self {
            room_code: room.room_code,
            host_name: room.host,
            users: room.members,
            video_id: room.video_id,
            current_time: room.position,
            is_playing: room.playing,
            created_at: format_system_time(room.created_at),
            last_active: format_system_time(room.last_active),
        }
    }
}

/// Members registered in a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomMembersResponse {
    /// Member keys in join order.
    pub users: Vec<String>,
}

/// Acknowledgement of a host-initiated deletion.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomDeletedResponse {
    /// Human readable confirmation.
    pub message: String,
    /// Code of the deleted room.
    pub room_code: String,
}
