use mongodb::bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::dao::models::{ChatMessageEntity, PlaybackUpdate, RoomEntity};

/// Room document; the room code doubles as primary key so uniqueness is free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    room_code: String,
    host: String,
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    position: f64,
    #[serde(default)]
    playing: bool,
    created_at: DateTime,
    last_active: DateTime,
}

impl MongoRoomDocument {
    pub fn has_member(&self, member: &str) -> bool {
        self.members.iter().any(|existing| existing == member)
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            room_code: value.room_code,
            host: value.host,
            members: value.members,
            video_id: value.video_id,
            position: value.position,
            playing: value.playing,
            created_at: DateTime::from_system_time(value.created_at),
            last_active: DateTime::from_system_time(value.last_active),
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            room_code: value.room_code,
            host: value.host,
            members: value.members,
            video_id: value.video_id,
            position: value.position,
            playing: value.playing,
            created_at: value.created_at.to_system_time(),
            last_active: value.last_active.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessageDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub room_code: String,
    pub user_id: Option<String>,
    pub username: String,
    pub message: String,
    pub created_at: DateTime,
}

impl From<MongoMessageDocument> for ChatMessageEntity {
    fn from(value: MongoMessageDocument) -> Self {
        Self {
            id: value.id.to_hex(),
            room_code: value.room_code,
            user_id: value.user_id,
            username: value.username,
            message: value.message,
            created_at: value.created_at.to_system_time(),
        }
    }
}

pub fn room_filter(code: &str) -> Document {
    doc! {"_id": code}
}

pub fn messages_filter(code: &str) -> Document {
    doc! {"room_code": code}
}

/// `$set` body for a playback patch, always refreshing `last_active`.
pub fn playback_set(update: &PlaybackUpdate, now: DateTime) -> Document {
    let mut set = doc! {"last_active": now};
    if let Some(playing) = update.playing {
        set.insert("playing", playing);
    }
    if let Some(position) = update.position {
        set.insert("position", position);
    }
    if let Some(video_id) = update.video_id.as_ref() {
        set.insert("video_id", Bson::String(video_id.clone()));
    }
    set
}

/// Field defaults written only when an upsert creates the room.
pub fn room_defaults(host: &str, now: DateTime) -> Document {
    doc! {
        "host": host,
        "video_id": Bson::Null,
        "position": 0.0,
        "playing": false,
        "created_at": now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_set_only_contains_requested_fields() {
        let now = DateTime::now();
        let set = playback_set(
            &PlaybackUpdate {
                playing: Some(false),
                position: Some(0.0),
                video_id: Some("xyz".into()),
            },
            now,
        );
        assert_eq!(set.get_bool("playing").ok(), Some(false));
        assert_eq!(set.get_f64("position").ok(), Some(0.0));
        assert_eq!(set.get_str("video_id").ok(), Some("xyz"));

        let set = playback_set(&PlaybackUpdate::default(), now);
        assert_eq!(set.len(), 1);
        assert!(set.contains_key("last_active"));
    }
}
