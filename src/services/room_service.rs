//! Room session coordination: joins, leaves, playback reconciliation, chat and teardown.
//!
//! Every room mutation goes through a single atomic store operation so
//! concurrent connections never need a lock spanning several steps.

use std::time::SystemTime;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    dao::models::{ChatMessageEntity, NewChatMessage, RoomEntity},
    dto::ws::VideoActionEvent,
    error::ServiceError,
    services::room_events,
    state::{
        SharedState,
        playback::PlaybackAction,
        presence::{ConnectionHandle, ConnectionId},
        room::{RoomCode, SYSTEM_USER_ID, SYSTEM_USERNAME, TeardownReason},
    },
};

/// What a call to [`leave`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The connection was not bound to any room.
    NotBound,
    /// The room had already been deleted.
    RoomMissing,
    /// Another live connection of the same member keeps it in the room.
    StillConnected,
    /// The member was removed and the room lives on.
    Left,
    /// The host left and the room was torn down.
    TornDown,
}

/// Join (or rejoin) `room_id`, creating the room with the caller as host if needed.
///
/// On success the joining connection has received `roomJoined`, the room has
/// received the refreshed user list and, for a member not seen before, a
/// system join message.
pub async fn join(
    state: &SharedState,
    connection: ConnectionId,
    room_id: Option<&str>,
    username: Option<String>,
) -> Result<RoomEntity, ServiceError> {
    let code = RoomCode::parse(room_id.unwrap_or_default())?;
    let presence = state.presence();
    let handle = registered(state, connection)?;

    if let Some(current) = presence.room_of(connection) {
        if current != code.as_str() {
            return Err(ServiceError::InvalidInput(format!(
                "Already in room {current}; leave it before joining another."
            )));
        }
    }

    let identity = handle.identity().with_display_name(username);
    presence.update_identity(connection, identity.clone());

    let storage = state.require_storage().await?;
    let is_new_member = storage
        .upsert_member(code.as_str(), identity.member_key(), SystemTime::now())
        .await?;

    let room = storage
        .find_room(code.as_str())
        .await?
        .ok_or_else(|| ServiceError::RoomNotFound(code.to_string()))?;

    presence.bind(connection, code.as_str())?;
    let mut history = storage
        .recent(code.as_str(), state.config().history_limit())
        .await?;
    // Leftovers from a previous room with the same code never replay.
    history.retain(|message| message.created_at >= room.created_at);

    let handle = registered(state, connection)?;
    room_events::send_room_joined(&handle, &room, history);
    room_events::broadcast_user_list(state, code.as_str());

    if is_new_member {
        let notice = NewChatMessage {
            room_code: code.to_string(),
            user_id: Some(SYSTEM_USER_ID.to_string()),
            username: SYSTEM_USERNAME.to_string(),
            message: format!("{} joined the room.", identity.display_name()),
        };
        match storage.append(notice).await {
            Ok(stored) => room_events::broadcast_chat_message(state, stored),
            Err(err) => {
                warn!(room = %code, error = %err, "failed to store join notice");
            }
        }
    }

    info!(
        room = %code,
        connection = %connection,
        user = %identity.display_name(),
        new_member = is_new_member,
        "connection joined room"
    );
    Ok(room)
}

/// Apply a playback action: echo it to the room first, then persist the transition.
///
/// Unknown actions are dropped without reply. A persistence failure is only
/// reported to the caller; peers keep the state they were sent.
pub async fn apply_playback_action(
    state: &SharedState,
    connection: ConnectionId,
    room_id: Option<&str>,
    action: &str,
    time: Option<f64>,
    video_id: Option<String>,
) -> Result<(), ServiceError> {
    let parsed = match action.parse::<PlaybackAction>() {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(connection = %connection, error = %err, "ignoring playback action");
            return Ok(());
        }
    };
    let room = bound_room(state, connection, room_id)?;

    let update = parsed.transition(time, video_id.as_deref());
    room_events::broadcast_video_action(
        state,
        &room,
        VideoActionEvent {
            action: parsed.as_str().to_string(),
            time,
            video_id,
        },
    );

    let storage = state.require_storage().await?;
    let stored = if update.is_empty() {
        storage.touch(&room, SystemTime::now()).await
    } else {
        storage
            .update_playback(&room, update, SystemTime::now())
            .await
    };
    match stored {
        Ok(true) => {
            debug!(room = %room, action = %parsed, ?time, "playback state stored");
            Ok(())
        }
        Ok(false) => Err(ServiceError::RoomNotFound(room)),
        Err(err) => {
            warn!(room = %room, action = %parsed, error = %err, "failed to store playback state");
            Err(ServiceError::PersistenceFailed(err))
        }
    }
}

/// Store a chat message from the connection's identity and broadcast it.
pub async fn post_chat_message(
    state: &SharedState,
    connection: ConnectionId,
    room_id: Option<&str>,
    text: String,
) -> Result<ChatMessageEntity, ServiceError> {
    let room = bound_room(state, connection, room_id)?;
    if text.trim().is_empty() {
        return Err(ServiceError::InvalidInput("Message must not be empty.".into()));
    }
    let handle = registered(state, connection)?;
    let identity = handle.identity();

    let storage = state.require_storage().await?;
    let stored = storage
        .append(NewChatMessage {
            room_code: room.clone(),
            user_id: identity.user_id().map(str::to_owned),
            username: identity.display_name().to_string(),
            message: text,
        })
        .await
        .map_err(|err| {
            warn!(room = %room, error = %err, "failed to store chat message");
            ServiceError::MessageSendFailed(err)
        })?;

    room_events::broadcast_chat_message(state, stored.clone());

    if let Err(err) = storage.touch(&room, SystemTime::now()).await {
        warn!(room = %room, error = %err, "failed to refresh room activity");
    }
    Ok(stored)
}

/// Take the connection out of its room, tearing the room down when the host leaves.
///
/// Runs to completion even if the socket is already gone.
pub async fn leave(
    state: &SharedState,
    connection: ConnectionId,
) -> Result<LeaveOutcome, ServiceError> {
    let presence = state.presence();
    let Some(handle) = presence.connection(connection) else {
        return Ok(LeaveOutcome::NotBound);
    };
    let Some(room) = presence.unbind(connection) else {
        return Ok(LeaveOutcome::NotBound);
    };

    let grace = state.config().leave_grace();
    if !grace.is_zero() {
        sleep(grace).await;
    }

    let identity = handle.identity();
    let member = identity.member_key();

    let storage = state.require_storage().await?;
    let Some(record) = storage.find_room(&room).await? else {
        info!(room = %room, connection = %connection, "room already gone; nothing to leave");
        return Ok(LeaveOutcome::RoomMissing);
    };

    if record.host == member {
        info!(room = %room, host = %member, "host left; tearing room down");
        teardown_room(state, &room, TeardownReason::HostLeft, None).await?;
        return Ok(LeaveOutcome::TornDown);
    }

    let still_connected = presence
        .connections_in(&room)
        .iter()
        .any(|other| other.identity().member_key() == member);
    if still_connected {
        debug!(room = %room, user = %member, "member still connected elsewhere");
        room_events::broadcast_user_list(state, &room);
        return Ok(LeaveOutcome::StillConnected);
    }

    storage
        .remove_member(&room, member, SystemTime::now())
        .await?;
    room_events::broadcast_user_list(state, &room);
    room_events::broadcast_ephemeral_notice(
        state,
        &room,
        format!("{} left the room.", identity.display_name()),
    );
    info!(room = %room, connection = %connection, user = %member, "connection left room");
    Ok(LeaveOutcome::Left)
}

/// Delete a room on behalf of `requester`, who must be its host.
pub async fn delete_room(
    state: &SharedState,
    requester: &str,
    room_code: &str,
) -> Result<(), ServiceError> {
    let code = RoomCode::parse(room_code)?;
    let storage = state.require_storage().await?;
    let room = storage
        .find_room(code.as_str())
        .await?
        .ok_or_else(|| ServiceError::RoomNotFound(code.to_string()))?;

    if room.host != requester.trim() {
        return Err(ServiceError::Forbidden(
            "Only the host can delete this room.".into(),
        ));
    }

    if !teardown_room(state, code.as_str(), TeardownReason::DeletedByHost, None).await? {
        return Err(ServiceError::RoomNotFound(code.to_string()));
    }
    Ok(())
}

/// Delete a room, notify and disconnect everyone in it and purge its chat history.
///
/// Connections that bound to the room while it was being deleted are notified
/// and disconnected too. A failed purge is reported after everyone has been
/// disconnected; the leftover messages are filtered out of later joins.
///
/// With `idle_since`, the room is only deleted if it has not been active since
/// that instant. Returns whether this call deleted the room.
pub async fn teardown_room(
    state: &SharedState,
    room: &str,
    reason: TeardownReason,
    idle_since: Option<SystemTime>,
) -> Result<bool, ServiceError> {
    let storage = state.require_storage().await?;
    let connections = state.presence().connections_in(room);

    let deleted = match idle_since {
        Some(cutoff) => storage.delete_room_if_inactive(room, cutoff).await?,
        None => storage.delete_room(room).await?,
    };
    if !deleted {
        debug!(room = %room, reason = reason.as_str(), "room not deleted; skipping teardown");
        return Ok(false);
    }

    room_events::broadcast_room_deleted(&connections, room, reason.message());
    let purged = storage.purge(room).await;

    let late_joiners: Vec<_> = state
        .presence()
        .connections_in(room)
        .into_iter()
        .filter(|late| connections.iter().all(|known| known.id() != late.id()))
        .collect();
    if !late_joiners.is_empty() {
        room_events::broadcast_room_deleted(&late_joiners, room, reason.message());
    }

    let mut disconnected = 0usize;
    for connection in connections.iter().chain(late_joiners.iter()) {
        if state.presence().unbind(connection.id()).is_some() {
            connection.close();
            disconnected += 1;
        }
    }

    let purged = purged?;
    info!(
        room = %room,
        reason = reason.as_str(),
        purged_messages = purged,
        disconnected,
        "room torn down"
    );
    Ok(true)
}

fn registered(state: &SharedState, connection: ConnectionId) -> Result<ConnectionHandle, ServiceError> {
    state
        .presence()
        .connection(connection)
        .ok_or_else(|| ServiceError::InvalidInput("Connection is not registered.".into()))
}

/// Room the connection is bound to, checked against the room it claims to act on.
fn bound_room(
    state: &SharedState,
    connection: ConnectionId,
    room_id: Option<&str>,
) -> Result<String, ServiceError> {
    let room = state
        .presence()
        .room_of(connection)
        .ok_or_else(|| ServiceError::InvalidInput("Join a room first.".into()))?;
    if let Some(claimed) = room_id {
        let claimed = RoomCode::parse(claimed)?;
        if claimed.as_str() != room {
            return Err(ServiceError::InvalidInput(format!(
                "Not a member of room {claimed}."
            )));
        }
    }
    Ok(room)
}
