/// In-process backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::dao::{
    models::{ChatMessageEntity, CreateOutcome, NewChatMessage, PlaybackUpdate, RoomEntity},
    storage::StorageResult,
};

/// Durable record of live rooms.
///
/// Every mutation is a single atomic operation on one field group, so
/// concurrent joins and leaves never lose each other's writes.
pub trait RoomStore: Send + Sync {
    /// Fetch a room by its canonical code.
    fn find_room(&self, code: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;

    /// Insert `room` unless a room with the same code already exists.
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<CreateOutcome>>;

    /// Add `member` to the room, creating the room with `member` as host when absent.
    ///
    /// Refreshes the activity timestamp. Returns `true` when `member` was not
    /// part of the room before this call (including when the room was created).
    fn upsert_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Add `member` to an existing room and refresh its activity timestamp.
    fn add_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;

    /// Pull `member` from the room and refresh its activity timestamp.
    fn remove_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;

    /// Set the playback fields carried by `update`; returns whether the room exists.
    fn update_playback(
        &self,
        code: &str,
        update: PlaybackUpdate,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Refresh the activity timestamp; returns whether the room exists.
    fn touch(&self, code: &str, now: SystemTime) -> BoxFuture<'static, StorageResult<bool>>;

    /// Delete the room; returns whether a room was removed.
    fn delete_room(&self, code: &str) -> BoxFuture<'static, StorageResult<bool>>;

    /// Delete the room only if it has been idle since before `cutoff`.
    fn delete_room_if_inactive(
        &self,
        code: &str,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Codes of rooms whose last activity is older than `cutoff`.
    fn find_inactive(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<Vec<String>>>;
}

/// Durable append-only chat history, one stream per room.
pub trait MessageLog: Send + Sync {
    /// Store a message, assigning its id and creation time.
    fn append(&self, message: NewChatMessage)
    -> BoxFuture<'static, StorageResult<ChatMessageEntity>>;

    /// Most recent `limit` messages of the room, oldest first.
    fn recent(
        &self,
        code: &str,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<ChatMessageEntity>>>;

    /// Delete every message of the room, returning how many were removed.
    fn purge(&self, code: &str) -> BoxFuture<'static, StorageResult<u64>>;
}

/// A complete storage backend installed into the shared state.
pub trait Storage: RoomStore + MessageLog {
    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;
    /// Check that the backend still answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Try to re-establish a lost connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
