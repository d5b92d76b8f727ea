//! Realtime protocol spoken over the room WebSocket.
//!
//! Frames are JSON objects tagged by `type`; field names are camelCase to
//! match the browser client.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

use crate::{dao::models::ChatMessageEntity, dto::unix_millis, state::room::Identity};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
/// Messages accepted from room WebSocket clients.
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join (or rejoin) a room, creating it when it does not exist.
    #[serde(rename = "joinRoom")]
    JoinRoom {
        /// Room code, case-insensitive.
        #[serde(rename = "roomId", default)]
        room_id: Option<String>,
        /// Display name to use in this room.
        #[serde(default)]
        username: Option<String>,
    },
    /// Play, pause, seek or change the shared video.
    #[serde(rename = "videoAction")]
    VideoAction {
        /// Room the action targets; must be the bound room.
        #[serde(rename = "roomId", default)]
        room_id: Option<String>,
        /// `play`, `pause`, `seek` or `changeVideo`.
        action: String,
        /// Position in seconds.
        #[serde(default)]
        time: Option<f64>,
        /// Video to load for `changeVideo`.
        #[serde(rename = "videoId", default)]
        video_id: Option<String>,
    },
    /// Post a chat message to the room.
    #[serde(rename = "chatMessage")]
    ChatMessage {
        /// Room the message targets; must be the bound room.
        #[serde(rename = "roomId", default)]
        room_id: Option<String>,
        /// Message body.
        message: String,
    },
    /// Leave the current room without closing the socket.
    #[serde(rename = "leaveRoom")]
    LeaveRoom,
    /// Any other `type`; ignored.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a text frame received from a client.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
/// Events pushed to room WebSocket clients.
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Unicast to a joining connection with the room state and chat history.
    #[serde(rename = "roomJoined")]
    RoomJoined(RoomJoinedEvent),
    /// Connections currently present in the room.
    #[serde(rename = "userList")]
    UserList(UserListEvent),
    /// A stored chat message or an ephemeral system notice.
    #[serde(rename = "chatMessage")]
    ChatMessage(ChatMessageEvent),
    /// Echo of a playback action so every player applies it.
    #[serde(rename = "videoAction")]
    VideoAction(VideoActionEvent),
    /// The room has been torn down; the socket is about to be closed.
    #[serde(rename = "roomDeleted")]
    RoomDeleted(NoticeEvent),
    /// Unicast failure of a join or playback request.
    #[serde(rename = "roomError")]
    RoomError(NoticeEvent),
    /// Unicast failure of a chat message.
    #[serde(rename = "messageError")]
    MessageError(NoticeEvent),
}

/// Room state handed to a connection that just joined.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinedEvent {
    /// Canonical room code.
    pub room_id: String,
    /// Loaded video, if any.
    pub video_id: Option<String>,
    /// Playback position in seconds.
    pub current_time: f64,
    /// Whether the player is playing.
    pub is_playing: bool,
    /// Recent chat history, oldest first.
    pub previous_messages: Vec<ChatMessageEvent>,
}

/// One connected user as shown in the user list.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserSummary {
    /// Persistent identifier, when the client supplied one.
    pub id: Option<String>,
    /// Display name.
    pub name: String,
}

impl From<&Identity> for UserSummary {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.user_id().map(str::to_owned),
            name: identity.display_name().to_owned(),
        }
    }
}

/// Connections currently bound to the room, in join order.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserListEvent {
    /// One entry per live connection.
    pub users: Vec<UserSummary>,
}

/// Chat line as delivered to clients.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    /// Absent for ephemeral notices that were never stored.
    pub id: Option<String>,
    /// Display name of the sender.
    pub username: String,
    /// Message body.
    pub message: String,
    /// Unix timestamp in milliseconds.
    pub ts: i64,
    /// Sender's persistent identifier, `system` for notices.
    pub user_id: Option<String>,
}

impl From<ChatMessageEntity> for ChatMessageEvent {
    fn from(entity: ChatMessageEntity) -> Self {
        Self {
            id: Some(entity.id),
            username: entity.username,
            message: entity.message,
            ts: unix_millis(entity.created_at),
            user_id: entity.user_id,
        }
    }
}

/// Playback action relayed to every connection of the room.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoActionEvent {
    /// Action name as sent by the client.
    pub action: String,
    /// Position in seconds, when provided.
    pub time: Option<f64>,
    /// Video to load for `changeVideo`.
    pub video_id: Option<String>,
}

/// Plain text notice used by teardown and error events.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct NoticeEvent {
    /// Text shown to the user.
    pub message: String,
}

impl NoticeEvent {
    /// Build a notice from any string-like message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_join_with_camel_case_fields() {
        let parsed =
            ClientMessage::from_json_str(r#"{"type":"joinRoom","roomId":"abc123","username":"bob"}"#)
                .unwrap();
        assert_eq!(
            parsed,
            ClientMessage::JoinRoom {
                room_id: Some("abc123".into()),
                username: Some("bob".into()),
            }
        );
    }

    #[test]
    fn parses_video_action_without_optional_fields() {
        let parsed =
            ClientMessage::from_json_str(r#"{"type":"videoAction","roomId":"ABC123","action":"pause"}"#)
                .unwrap();
        assert_eq!(
            parsed,
            ClientMessage::VideoAction {
                room_id: Some("ABC123".into()),
                action: "pause".into(),
                time: None,
                video_id: None,
            }
        );
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let parsed = ClientMessage::from_json_str(r#"{"type":"typing"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::Unknown);
    }

    #[test]
    fn ephemeral_notice_omits_id_and_user() {
        let event = ServerMessage::ChatMessage(ChatMessageEvent {
            id: None,
            username: "System".into(),
            message: "bob left the room.".into(),
            ts: 42,
            user_id: None,
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "chatMessage", "username": "System", "message": "bob left the room.", "ts": 42})
        );
    }

    #[test]
    fn room_joined_uses_client_field_names() {
        let event = ServerMessage::RoomJoined(RoomJoinedEvent {
            room_id: "ABC123".into(),
            video_id: None,
            current_time: 12.5,
            is_playing: true,
            previous_messages: vec![],
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "roomJoined",
                "roomId": "ABC123",
                "videoId": null,
                "currentTime": 12.5,
                "isPlaying": true,
                "previousMessages": [],
            })
        );
    }
}
