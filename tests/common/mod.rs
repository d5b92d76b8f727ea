#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, SystemTime},
};

use dashmap::DashSet;
use futures::future::{self, BoxFuture};
use tokio::sync::mpsc;
use uuid::Uuid;
use watch_together_back::{
    config::AppConfig,
    dao::{
        models::{ChatMessageEntity, CreateOutcome, NewChatMessage, PlaybackUpdate, RoomEntity},
        room_store::{MessageLog, RoomStore, Storage, memory::MemoryStore},
        storage::{StorageError, StorageResult},
    },
    dto::ws::ServerMessage,
    state::{
        AppState, SharedState,
        presence::{ConnectionHandle, ConnectionId, Outbound},
        room::Identity,
    },
};

pub fn test_config() -> AppConfig {
    AppConfig::default().with_leave_grace(Duration::ZERO)
}

/// Shared state backed by a fresh memory store.
pub async fn memory_state() -> (SharedState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(test_config());
    state.install_storage(store.clone()).await;
    (state, store)
}

/// Shared state backed by a store whose failures can be switched on.
pub async fn flaky_state() -> (SharedState, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    let state = AppState::new(test_config());
    state.install_storage(store.clone()).await;
    (state, store)
}

/// A registered connection whose outbound queue is inspected by the test.
pub struct TestClient {
    pub id: ConnectionId,
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl TestClient {
    pub fn connect(state: &SharedState, user_id: Option<&str>, name: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let identity = Identity::new(user_id.map(str::to_owned), Some(name.to_owned()));
        state
            .presence()
            .register(ConnectionHandle::new(id, identity, tx));
        Self { id, rx }
    }

    /// Everything queued so far.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut items = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }

    /// Queued events, ignoring close requests.
    pub fn events(&mut self) -> Vec<ServerMessage> {
        self.drain()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Event(event) => Some(event),
                Outbound::Close => None,
            })
            .collect()
    }
}

/// Names carried by the last user list in `events`.
pub fn last_user_list(events: &[ServerMessage]) -> Option<Vec<String>> {
    events.iter().rev().find_map(|event| match event {
        ServerMessage::UserList(list) => {
            Some(list.users.iter().map(|user| user.name.clone()).collect())
        }
        _ => None,
    })
}

/// Stored messages whose body is `text`.
pub async fn count_messages(store: &dyn Storage, room: &str, text: &str) -> usize {
    store
        .recent(room, usize::MAX)
        .await
        .unwrap()
        .iter()
        .filter(|message| message.message == text)
        .count()
}

/// Number of stored messages for `room`.
pub async fn stored_messages(store: &dyn Storage, room: &str) -> usize {
    store.recent(room, usize::MAX).await.unwrap().len()
}

pub fn hours_ago(hours: u64) -> SystemTime {
    SystemTime::now() - Duration::from_secs(hours * 3600)
}

/// Memory store with switchable failures.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_playback: AtomicBool,
    pub fail_append: AtomicBool,
    pub fail_purge: AtomicBool,
    /// Rooms whose deletion fails.
    pub fail_delete: DashSet<String>,
    /// Runs once, right after the next successful room deletion.
    pub after_delete: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl FlakyStore {
    pub fn set_fail_playback(&self, value: bool) {
        self.fail_playback.store(value, Ordering::SeqCst);
    }

    pub fn set_fail_append(&self, value: bool) {
        self.fail_append.store(value, Ordering::SeqCst);
    }

    pub fn set_fail_purge(&self, value: bool) {
        self.fail_purge.store(value, Ordering::SeqCst);
    }

    pub fn on_next_delete(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_delete.lock().unwrap() = Some(Box::new(hook));
    }

    fn run_delete_hook(&self) {
        let hook = self.after_delete.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

fn injected<T: Send + 'static>() -> BoxFuture<'static, StorageResult<T>> {
    Box::pin(future::ready(Err(StorageError::unavailable(
        "flaky",
        "injected failure".into(),
        std::io::Error::other("injected failure"),
    ))))
}

impl RoomStore for FlakyStore {
    fn find_room(&self, code: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.inner.find_room(code)
    }

    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<CreateOutcome>> {
        self.inner.create_room(room)
    }

    fn upsert_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.upsert_member(code, member, now)
    }

    fn add_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.inner.add_member(code, member, now)
    }

    fn remove_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.inner.remove_member(code, member, now)
    }

    fn update_playback(
        &self,
        code: &str,
        update: PlaybackUpdate,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        if self.fail_playback.load(Ordering::SeqCst) {
            return injected();
        }
        self.inner.update_playback(code, update, now)
    }

    fn touch(&self, code: &str, now: SystemTime) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.touch(code, now)
    }

    fn delete_room(&self, code: &str) -> BoxFuture<'static, StorageResult<bool>> {
        if self.fail_delete.contains(code) {
            return injected();
        }
        let deleted = self.inner.delete_room(code);
        self.run_delete_hook();
        deleted
    }

    fn delete_room_if_inactive(
        &self,
        code: &str,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        if self.fail_delete.contains(code) {
            return injected();
        }
        self.inner.delete_room_if_inactive(code, cutoff)
    }

    fn find_inactive(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        self.inner.find_inactive(cutoff)
    }
}

impl MessageLog for FlakyStore {
    fn append(
        &self,
        message: NewChatMessage,
    ) -> BoxFuture<'static, StorageResult<ChatMessageEntity>> {
        if self.fail_append.load(Ordering::SeqCst) {
            return injected();
        }
        self.inner.append(message)
    }

    fn recent(
        &self,
        code: &str,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<ChatMessageEntity>>> {
        self.inner.recent(code, limit)
    }

    fn purge(&self, code: &str) -> BoxFuture<'static, StorageResult<u64>> {
        if self.fail_purge.load(Ordering::SeqCst) {
            return injected();
        }
        self.inner.purge(code)
    }
}

impl Storage for FlakyStore {
    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
