//! Volatile in-process backend. Each room key is updated under its own
//! `DashMap` shard lock, which gives the same per-operation atomicity as the
//! MongoDB backend's single-document updates.

use std::time::SystemTime;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{self, BoxFuture};
use tracing::debug;
use uuid::Uuid;

use super::{MessageLog, RoomStore, Storage};
use crate::dao::{
    models::{ChatMessageEntity, CreateOutcome, NewChatMessage, PlaybackUpdate, RoomEntity},
    storage::StorageResult,
};

const BACKEND: &str = "memory";

/// Storage backend keeping rooms and chat history in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: DashMap<String, RoomEntity>,
    messages: DashMap<String, Vec<ChatMessageEntity>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn ready<T: Send + 'static>(value: T) -> BoxFuture<'static, StorageResult<T>> {
    Box::pin(future::ready(Ok(value)))
}

impl RoomStore for MemoryStore {
    fn find_room(&self, code: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        ready(self.rooms.get(code).map(|room| room.clone()))
    }

    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<CreateOutcome>> {
        let outcome = match self.rooms.entry(room.room_code.clone()) {
            Entry::Occupied(_) => CreateOutcome::AlreadyExists,
            Entry::Vacant(slot) => {
                slot.insert(room.clone());
                CreateOutcome::Created(room)
            }
        };
        ready(outcome)
    }

    fn upsert_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let added = match self.rooms.entry(code.to_owned()) {
            Entry::Occupied(mut slot) => {
                let room = slot.get_mut();
                room.last_active = now;
                room.add_member(member.to_owned())
            }
            Entry::Vacant(slot) => {
                debug!(room = %code, host = %member, "creating room on first join");
                slot.insert(RoomEntity::new(code, member, vec![member.to_owned()], now));
                true
            }
        };
        ready(added)
    }

    fn add_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let updated = self.rooms.get_mut(code).map(|mut room| {
            room.add_member(member.to_owned());
            room.last_active = now;
            room.clone()
        });
        ready(updated)
    }

    fn remove_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let updated = self.rooms.get_mut(code).map(|mut room| {
            room.remove_member(member);
            room.last_active = now;
            room.clone()
        });
        ready(updated)
    }

    fn update_playback(
        &self,
        code: &str,
        update: PlaybackUpdate,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let found = self
            .rooms
            .get_mut(code)
            .map(|mut room| {
                room.apply_playback(&update);
                room.last_active = now;
            })
            .is_some();
        ready(found)
    }

    fn touch(&self, code: &str, now: SystemTime) -> BoxFuture<'static, StorageResult<bool>> {
        let found = self
            .rooms
            .get_mut(code)
            .map(|mut room| room.last_active = now)
            .is_some();
        ready(found)
    }

    fn delete_room(&self, code: &str) -> BoxFuture<'static, StorageResult<bool>> {
        ready(self.rooms.remove(code).is_some())
    }

    fn delete_room_if_inactive(
        &self,
        code: &str,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let removed = self
            .rooms
            .remove_if(code, |_, room| room.last_active < cutoff)
            .is_some();
        ready(removed)
    }

    fn find_inactive(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let codes = self
            .rooms
            .iter()
            .filter(|entry| entry.last_active < cutoff)
            .map(|entry| entry.key().clone())
            .collect();
        ready(codes)
    }
}

impl MessageLog for MemoryStore {
    fn append(
        &self,
        message: NewChatMessage,
    ) -> BoxFuture<'static, StorageResult<ChatMessageEntity>> {
        let entity = ChatMessageEntity {
            id: Uuid::new_v4().simple().to_string(),
            room_code: message.room_code,
            user_id: message.user_id,
            username: message.username,
            message: message.message,
            created_at: SystemTime::now(),
        };
        self.messages
            .entry(entity.room_code.clone())
            .or_default()
            .push(entity.clone());
        ready(entity)
    }

    fn recent(
        &self,
        code: &str,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<ChatMessageEntity>>> {
        let history = self
            .messages
            .get(code)
            .map(|log| {
                let skip = log.len().saturating_sub(limit);
                log[skip..].to_vec()
            })
            .unwrap_or_default();
        ready(history)
    }

    fn purge(&self, code: &str) -> BoxFuture<'static, StorageResult<u64>> {
        let removed = self
            .messages
            .remove(code)
            .map_or(0, |(_, log)| log.len() as u64);
        ready(removed)
    }
}

impl Storage for MemoryStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn block<T>(fut: BoxFuture<'static, StorageResult<T>>) -> T {
        futures::executor::block_on(fut).expect("memory store never fails")
    }

    fn chat(code: &str, text: &str) -> NewChatMessage {
        NewChatMessage {
            room_code: code.into(),
            user_id: Some("u1".into()),
            username: "alice".into(),
            message: text.into(),
        }
    }

    #[test]
    fn upsert_creates_room_with_first_member_as_host() {
        let store = MemoryStore::new();
        let now = SystemTime::now();

        assert!(block(store.upsert_member("ABC123", "alice", now)));
        assert!(block(store.upsert_member("ABC123", "bob", now)));
        assert!(!block(store.upsert_member("ABC123", "bob", now)));

        let room = block(store.find_room("ABC123")).unwrap();
        assert_eq!(room.host, "alice");
        assert_eq!(room.members, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn create_room_refuses_duplicates() {
        let store = MemoryStore::new();
        let room = RoomEntity::new("ABC123", "alice", vec![], SystemTime::now());

        assert!(matches!(
            block(store.create_room(room.clone())),
            CreateOutcome::Created(_)
        ));
        assert_eq!(block(store.create_room(room)), CreateOutcome::AlreadyExists);
    }

    #[test]
    fn recent_returns_latest_messages_oldest_first() {
        let store = MemoryStore::new();
        for index in 0..5 {
            block(store.append(chat("ABC123", &format!("m{index}"))));
        }

        let history = block(store.recent("ABC123", 3));
        let bodies: Vec<_> = history.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn purge_only_touches_one_room() {
        let store = MemoryStore::new();
        block(store.append(chat("ABC123", "hello")));
        block(store.append(chat("XYZ789", "hi")));

        assert_eq!(block(store.purge("ABC123")), 1);
        assert!(block(store.recent("ABC123", 10)).is_empty());
        assert_eq!(block(store.recent("XYZ789", 10)).len(), 1);
    }

    #[test]
    fn conditional_delete_spares_refreshed_rooms() {
        let store = MemoryStore::new();
        let old = SystemTime::now() - Duration::from_secs(7200);
        let cutoff = SystemTime::now() - Duration::from_secs(3600);
        block(store.create_room(RoomEntity::new("OLD001", "alice", vec![], old)));
        block(store.create_room(RoomEntity::new("NEW001", "bob", vec![], old)));
        block(store.touch("NEW001", SystemTime::now()));

        let mut idle = block(store.find_inactive(cutoff));
        idle.sort();
        assert_eq!(idle, vec!["OLD001".to_string()]);

        assert!(!block(store.delete_room_if_inactive("NEW001", cutoff)));
        assert!(block(store.delete_room_if_inactive("OLD001", cutoff)));
    }
}
