use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Persisted record of a live room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomEntity {
    /// Canonical (uppercase) room code, unique across live rooms.
    pub room_code: String,
    /// Member key of the identity that created the room. Never changes.
    pub host: String,
    /// Member keys currently registered in the room, without duplicates.
    pub members: Vec<String>,
    /// Video loaded in the shared player, if any.
    pub video_id: Option<String>,
    /// Playback position in seconds.
    pub position: f64,
    /// Whether the shared player is playing.
    pub playing: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time any action touched the room; drives inactivity expiry.
    pub last_active: SystemTime,
}

impl RoomEntity {
    /// Build a fresh room in its initial playback state (paused at 0, no video).
    pub fn new(
        room_code: impl Into<String>,
        host: impl Into<String>,
        members: Vec<String>,
        now: SystemTime,
    ) -> Self {
        let mut room = Self {
            room_code: room_code.into(),
            host: host.into(),
            members: Vec::with_capacity(members.len()),
            video_id: None,
            position: 0.0,
            playing: false,
            created_at: now,
            last_active: now,
        };
        for member in members {
            room.add_member(member);
        }
        room
    }

    /// Whether `member` is part of the member set.
    pub fn has_member(&self, member: &str) -> bool {
        self.members.iter().any(|existing| existing == member)
    }

    /// Add `member` to the set, returning `false` when it was already present.
    pub fn add_member(&mut self, member: String) -> bool {
        if self.has_member(&member) {
            return false;
        }
        self.members.push(member);
        true
    }

    /// Remove `member` from the set, returning whether it was present.
    pub fn remove_member(&mut self, member: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|existing| existing != member);
        before != self.members.len()
    }

    /// Apply a playback patch in place, leaving untouched fields as they are.
    pub fn apply_playback(&mut self, update: &PlaybackUpdate) {
        if let Some(playing) = update.playing {
            self.playing = playing;
        }
        if let Some(position) = update.position {
            self.position = position;
        }
        if let Some(video_id) = update.video_id.as_ref() {
            self.video_id = Some(video_id.clone());
        }
    }
}

/// Field-group patch applied atomically to a room's playback state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackUpdate {
    /// New value for the playing flag.
    pub playing: Option<bool>,
    /// New playback position in seconds.
    pub position: Option<f64>,
    /// New video identifier.
    pub video_id: Option<String>,
}

impl PlaybackUpdate {
    /// True when the patch would not change any field.
    pub fn is_empty(&self) -> bool {
        self.playing.is_none() && self.position.is_none() && self.video_id.is_none()
    }
}

/// Outcome of an insert-if-absent room creation.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// The room did not exist and has been stored.
    Created(RoomEntity),
    /// A room with the same code is already live; nothing was written.
    AlreadyExists,
}

/// Chat message as stored in the message log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessageEntity {
    /// Storage-assigned identifier.
    pub id: String,
    /// Room the message belongs to.
    pub room_code: String,
    /// Persistent identifier of the sender (`system` for synthesized messages).
    pub user_id: Option<String>,
    /// Display name of the sender.
    pub username: String,
    /// Message body.
    pub message: String,
    /// Storage-assigned creation time; defines replay order.
    pub created_at: SystemTime,
}

/// Chat message awaiting insertion; id and timestamp are assigned by the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    /// Room the message belongs to.
    pub room_code: String,
    /// Persistent identifier of the sender.
    pub user_id: Option<String>,
    /// Display name of the sender.
    pub username: String,
    /// Message body.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_room_deduplicates_initial_members() {
        let room = RoomEntity::new(
            "ABC123",
            "alice",
            vec!["alice".into(), "bob".into(), "alice".into()],
            SystemTime::UNIX_EPOCH,
        );
        assert_eq!(room.members, vec!["alice".to_string(), "bob".to_string()]);
        assert!(!room.playing);
        assert_eq!(room.position, 0.0);
        assert!(room.video_id.is_none());
    }

    #[test]
    fn apply_playback_keeps_unset_fields() {
        let mut room = RoomEntity::new("ABC123", "alice", vec![], SystemTime::UNIX_EPOCH);
        room.video_id = Some("abc".into());
        room.apply_playback(&PlaybackUpdate {
            playing: Some(true),
            position: None,
            video_id: None,
        });
        assert!(room.playing);
        assert_eq!(room.video_id.as_deref(), Some("abc"));
        assert_eq!(room.position, 0.0);
    }

    #[test]
    fn remove_member_reports_presence() {
        let mut room = RoomEntity::new("ABC123", "alice", vec!["bob".into()], SystemTime::UNIX_EPOCH);
        assert!(room.remove_member("bob"));
        assert!(!room.remove_member("bob"));
    }
}
