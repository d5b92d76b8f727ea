//! Fan-out helpers pushing realtime events to the connections of a room.

use std::time::SystemTime;

use tracing::debug;

use crate::{
    dao::models::{ChatMessageEntity, RoomEntity},
    dto::{
        unix_millis,
        ws::{
            ChatMessageEvent, NoticeEvent, RoomJoinedEvent, ServerMessage, UserListEvent,
            UserSummary, VideoActionEvent,
        },
    },
    state::{
        SharedState,
        presence::{ConnectionHandle, ConnectionId},
        room::SYSTEM_USERNAME,
    },
};

/// Unicast the room state and chat history to a connection that just joined.
pub fn send_room_joined(
    connection: &ConnectionHandle,
    room: &RoomEntity,
    history: Vec<ChatMessageEntity>,
) {
    let payload = RoomJoinedEvent {
        room_id: room.room_code.clone(),
        video_id: room.video_id.clone(),
        current_time: room.position,
        is_playing: room.playing,
        previous_messages: history.into_iter().map(ChatMessageEvent::from).collect(),
    };
    send_to(connection, ServerMessage::RoomJoined(payload));
}

/// Broadcast the identities currently reachable in the room.
pub fn broadcast_user_list(state: &SharedState, room: &str) {
    let connections = state.presence().connections_in(room);
    let users = connections
        .iter()
        .map(|conn| UserSummary::from(conn.identity()))
        .collect();
    broadcast_to(&connections, room, ServerMessage::UserList(UserListEvent { users }));
}

/// Broadcast a stored chat message.
pub fn broadcast_chat_message(state: &SharedState, message: ChatMessageEntity) {
    let room = message.room_code.clone();
    broadcast(
        state,
        &room,
        ServerMessage::ChatMessage(ChatMessageEvent::from(message)),
    );
}

/// Broadcast a system notice that is never written to the message log.
pub fn broadcast_ephemeral_notice(state: &SharedState, room: &str, text: String) {
    let event = ChatMessageEvent {
        id: None,
        username: SYSTEM_USERNAME.to_string(),
        message: text,
        ts: unix_millis(SystemTime::now()),
        user_id: None,
    };
    broadcast(state, room, ServerMessage::ChatMessage(event));
}

/// Echo a playback action to every connection of the room.
pub fn broadcast_video_action(state: &SharedState, room: &str, event: VideoActionEvent) {
    broadcast(state, room, ServerMessage::VideoAction(event));
}

/// Tell the given connections that their room is gone.
pub fn broadcast_room_deleted(connections: &[ConnectionHandle], room: &str, message: &str) {
    broadcast_to(
        connections,
        room,
        ServerMessage::RoomDeleted(NoticeEvent::new(message)),
    );
}

/// Report a join or playback failure to a single connection.
pub fn send_room_error(state: &SharedState, connection: ConnectionId, message: String) {
    send_to_id(state, connection, ServerMessage::RoomError(NoticeEvent::new(message)));
}

/// Report a chat failure to a single connection.
pub fn send_message_error(state: &SharedState, connection: ConnectionId, message: String) {
    send_to_id(
        state,
        connection,
        ServerMessage::MessageError(NoticeEvent::new(message)),
    );
}

fn broadcast(state: &SharedState, room: &str, message: ServerMessage) {
    let connections = state.presence().connections_in(room);
    broadcast_to(&connections, room, message);
}

fn broadcast_to(connections: &[ConnectionHandle], room: &str, message: ServerMessage) {
    let mut delivered = 0usize;
    for connection in connections {
        if connection.send(message.clone()) {
            delivered += 1;
        }
    }
    debug!(room = %room, delivered, total = connections.len(), "room event broadcast");
}

fn send_to_id(state: &SharedState, connection: ConnectionId, message: ServerMessage) {
    match state.presence().connection(connection) {
        Some(handle) => send_to(&handle, message),
        None => debug!(connection = %connection, "dropping event for unknown connection"),
    }
}

fn send_to(connection: &ConnectionHandle, message: ServerMessage) {
    if !connection.send(message) {
        debug!(connection = %connection.id(), "writer closed; event dropped");
    }
}
