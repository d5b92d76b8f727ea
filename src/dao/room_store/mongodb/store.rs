use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, doc, oid::ObjectId},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    BACKEND,
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoMessageDocument, MongoRoomDocument, messages_filter, playback_set, room_defaults,
        room_filter,
    },
};
use crate::dao::{
    models::{ChatMessageEntity, CreateOutcome, NewChatMessage, PlaybackUpdate, RoomEntity},
    room_store::{MessageLog, RoomStore, Storage},
    storage::StorageResult,
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const MESSAGE_COLLECTION_NAME: &str = "messages";

/// MongoDB-backed room store and message log.
#[derive(Clone)]
pub struct MongoStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let rooms = self.rooms().await;
        let activity_index = IndexModel::builder()
            .keys(doc! {"last_active": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_last_active_idx".to_owned()))
                    .build(),
            )
            .build();
        rooms
            .create_index(activity_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "last_active",
                source,
            })?;

        // Bounded history retrieval walks this index backwards from the newest entry.
        let messages = self.messages().await;
        let history_index = IndexModel::builder()
            .keys(doc! {"room_code": 1, "created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("message_room_created_idx".to_owned()))
                    .build(),
            )
            .build();
        messages
            .create_index(history_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MESSAGE_COLLECTION_NAME,
                index: "room_code,created_at",
                source,
            })?;

        Ok(())
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn messages(&self) -> Collection<MongoMessageDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoMessageDocument>(MESSAGE_COLLECTION_NAME)
    }

    async fn find_room(&self, code: String) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(room_filter(&code))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { code, source })?;
        Ok(document.map(Into::into))
    }

    async fn create_room(&self, room: RoomEntity) -> MongoResult<CreateOutcome> {
        let document: MongoRoomDocument = room.clone().into();
        match self.rooms().await.insert_one(&document).await {
            Ok(_) => Ok(CreateOutcome::Created(room)),
            Err(source) if is_duplicate_key(&source) => Ok(CreateOutcome::AlreadyExists),
            Err(source) => Err(MongoDaoError::SaveRoom {
                code: room.room_code,
                source,
            }),
        }
    }

    async fn upsert_member(
        &self,
        code: String,
        member: String,
        now: SystemTime,
    ) -> MongoResult<bool> {
        let now = DateTime::from_system_time(now);
        let update = doc! {
            "$addToSet": {"members": member.as_str()},
            "$set": {"last_active": now},
            "$setOnInsert": room_defaults(&member, now),
        };
        let rooms = self.rooms().await;

        // Two concurrent upserts of a brand-new code can race on `_id`; the
        // loser retries once and then finds the document the winner inserted.
        let mut retried = false;
        loop {
            let result = rooms
                .find_one_and_update(room_filter(&code), update.clone())
                .upsert(true)
                .return_document(ReturnDocument::Before)
                .await;
            match result {
                Ok(before) => return Ok(before.is_none_or(|room| !room.has_member(&member))),
                Err(source) if !retried && is_duplicate_key(&source) => {
                    debug!(room = %code, "concurrent room creation detected; retrying upsert");
                    retried = true;
                }
                Err(source) => return Err(MongoDaoError::SaveRoom { code, source }),
            }
        }
    }

    async fn add_member(
        &self,
        code: String,
        member: String,
        now: SystemTime,
    ) -> MongoResult<Option<RoomEntity>> {
        let update = doc! {
            "$addToSet": {"members": member},
            "$set": {"last_active": DateTime::from_system_time(now)},
        };
        let document = self
            .rooms()
            .await
            .find_one_and_update(room_filter(&code), update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { code, source })?;
        Ok(document.map(Into::into))
    }

    async fn remove_member(
        &self,
        code: String,
        member: String,
        now: SystemTime,
    ) -> MongoResult<Option<RoomEntity>> {
        let update = doc! {
            "$pull": {"members": member},
            "$set": {"last_active": DateTime::from_system_time(now)},
        };
        let document = self
            .rooms()
            .await
            .find_one_and_update(room_filter(&code), update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { code, source })?;
        Ok(document.map(Into::into))
    }

    async fn update_playback(
        &self,
        code: String,
        update: PlaybackUpdate,
        now: SystemTime,
    ) -> MongoResult<bool> {
        let set = playback_set(&update, DateTime::from_system_time(now));
        let result = self
            .rooms()
            .await
            .update_one(room_filter(&code), doc! {"$set": set})
            .await
            .map_err(|source| MongoDaoError::SaveRoom { code, source })?;
        Ok(result.matched_count > 0)
    }

    async fn touch(&self, code: String, now: SystemTime) -> MongoResult<bool> {
        let update = doc! {"$set": {"last_active": DateTime::from_system_time(now)}};
        let result = self
            .rooms()
            .await
            .update_one(room_filter(&code), update)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { code, source })?;
        Ok(result.matched_count > 0)
    }

    async fn delete_room(&self, code: String) -> MongoResult<bool> {
        let result = self
            .rooms()
            .await
            .delete_one(room_filter(&code))
            .await
            .map_err(|source| MongoDaoError::DeleteRoom { code, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_room_if_inactive(&self, code: String, cutoff: SystemTime) -> MongoResult<bool> {
        let filter = doc! {
            "_id": code.as_str(),
            "last_active": {"$lt": DateTime::from_system_time(cutoff)},
        };
        let result = self
            .rooms()
            .await
            .delete_one(filter)
            .await
            .map_err(|source| MongoDaoError::DeleteRoom { code, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn find_inactive(&self, cutoff: SystemTime) -> MongoResult<Vec<String>> {
        let documents: Vec<MongoRoomDocument> = self
            .rooms()
            .await
            .find(doc! {"last_active": {"$lt": DateTime::from_system_time(cutoff)}})
            .await
            .map_err(|source| MongoDaoError::ListInactive { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListInactive { source })?;

        Ok(documents
            .iter()
            .map(|document| document.room_code().to_owned())
            .collect())
    }

    async fn append(&self, message: NewChatMessage) -> MongoResult<ChatMessageEntity> {
        let document = MongoMessageDocument {
            id: ObjectId::new(),
            room_code: message.room_code,
            user_id: message.user_id,
            username: message.username,
            message: message.message,
            created_at: DateTime::now(),
        };

        self.messages()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendMessage {
                code: document.room_code.clone(),
                source,
            })?;

        Ok(document.into())
    }

    async fn recent(&self, code: String, limit: usize) -> MongoResult<Vec<ChatMessageEntity>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut documents: Vec<MongoMessageDocument> = self
            .messages()
            .await
            .find(messages_filter(&code))
            .sort(doc! {"created_at": -1, "_id": -1})
            .limit(limit)
            .await
            .map_err(|source| MongoDaoError::LoadMessages {
                code: code.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadMessages { code, source })?;

        documents.reverse();
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn purge(&self, code: String) -> MongoResult<u64> {
        let result = self
            .messages()
            .await
            .delete_many(messages_filter(&code))
            .await
            .map_err(|source| MongoDaoError::PurgeMessages { code, source })?;
        Ok(result.deleted_count)
    }
}

impl RoomStore for MongoStore {
    fn find_room(&self, code: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.find_room(code).await.map_err(Into::into) })
    }

    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<CreateOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.create_room(room).await.map_err(Into::into) })
    }

    fn upsert_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let (code, member) = (code.to_owned(), member.to_owned());
        Box::pin(async move {
            store
                .upsert_member(code, member, now)
                .await
                .map_err(Into::into)
        })
    }

    fn add_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        let (code, member) = (code.to_owned(), member.to_owned());
        Box::pin(async move { store.add_member(code, member, now).await.map_err(Into::into) })
    }

    fn remove_member(
        &self,
        code: &str,
        member: &str,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        let (code, member) = (code.to_owned(), member.to_owned());
        Box::pin(async move {
            store
                .remove_member(code, member, now)
                .await
                .map_err(Into::into)
        })
    }

    fn update_playback(
        &self,
        code: &str,
        update: PlaybackUpdate,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move {
            store
                .update_playback(code, update, now)
                .await
                .map_err(Into::into)
        })
    }

    fn touch(&self, code: &str, now: SystemTime) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.touch(code, now).await.map_err(Into::into) })
    }

    fn delete_room(&self, code: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.delete_room(code).await.map_err(Into::into) })
    }

    fn delete_room_if_inactive(
        &self,
        code: &str,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move {
            store
                .delete_room_if_inactive(code, cutoff)
                .await
                .map_err(Into::into)
        })
    }

    fn find_inactive(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move { store.find_inactive(cutoff).await.map_err(Into::into) })
    }
}

impl MessageLog for MongoStore {
    fn append(
        &self,
        message: NewChatMessage,
    ) -> BoxFuture<'static, StorageResult<ChatMessageEntity>> {
        let store = self.clone();
        Box::pin(async move { store.append(message).await.map_err(Into::into) })
    }

    fn recent(
        &self,
        code: &str,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<ChatMessageEntity>>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.recent(code, limit).await.map_err(Into::into) })
    }

    fn purge(&self, code: &str) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.purge(code).await.map_err(Into::into) })
    }
}

impl Storage for MongoStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
