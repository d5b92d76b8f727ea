//! Live connection registry: which sockets are reachable and which room each is bound to.

use dashmap::DashMap;
use indexmap::IndexSet;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::{dto::ws::ServerMessage, state::room::Identity};

/// Identifier of a single realtime connection.
pub type ConnectionId = Uuid;

/// Item queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Serialize and send an event.
    Event(ServerMessage),
    /// Close the socket.
    Close,
}

/// Handle used to push events to a connected client.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    identity: Identity,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Wrap the sending half of a connection's outbound queue.
    pub fn new(id: ConnectionId, identity: Identity, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { id, identity, tx }
    }

    /// Connection identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Identity the connection currently acts as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Queue an event; returns `false` once the writer has gone away.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.tx.send(Outbound::Event(message)).is_ok()
    }

    /// Ask the writer to close the socket after draining queued events.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

/// Reasons a connection cannot be bound to a room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The connection was never registered or is already gone.
    #[error("connection `{0}` is not registered")]
    UnknownConnection(ConnectionId),
    /// The connection is bound to another room.
    #[error("connection is already in room `{0}`")]
    AlreadyBound(String),
}

/// Tracks live connections and their room membership.
///
/// Answers "who is reachable right now" ahead of the persisted member set,
/// which lags behind while leaves are being processed.
pub trait PresenceTracker: Send + Sync {
    /// Make a freshly opened connection known.
    fn register(&self, handle: ConnectionHandle);
    /// Forget a connection, unbinding it from its room.
    fn deregister(&self, id: ConnectionId) -> Option<ConnectionHandle>;
    /// Current handle of a connection.
    fn connection(&self, id: ConnectionId) -> Option<ConnectionHandle>;
    /// Replace the identity carried by a connection.
    fn update_identity(&self, id: ConnectionId, identity: Identity) -> bool;
    /// Bind a connection to `room`. Binding twice to the same room is a no-op.
    fn bind(&self, id: ConnectionId, room: &str) -> Result<(), BindError>;
    /// Unbind a connection, returning the room it was bound to.
    fn unbind(&self, id: ConnectionId) -> Option<String>;
    /// Room a connection is bound to.
    fn room_of(&self, id: ConnectionId) -> Option<String>;
    /// Connections bound to `room`, in bind order.
    fn connections_in(&self, room: &str) -> Vec<ConnectionHandle>;
}

#[derive(Debug)]
struct PresenceEntry {
    handle: ConnectionHandle,
    room: Option<String>,
}

/// In-process [`PresenceTracker`].
///
/// Lock order is `connections` before `rooms`; no path takes them the other way round.
#[derive(Debug, Default)]
pub struct LocalPresence {
    connections: DashMap<ConnectionId, PresenceEntry>,
    rooms: DashMap<String, IndexSet<ConnectionId>>,
}

impl LocalPresence {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn detach(&self, room: &str, id: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.shift_remove(&id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }
}

impl PresenceTracker for LocalPresence {
    fn register(&self, handle: ConnectionHandle) {
        let id = handle.id();
        self.connections
            .insert(id, PresenceEntry { handle, room: None });
        debug!(connection = %id, "connection registered");
    }

    fn deregister(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        let (_, entry) = self.connections.remove(&id)?;
        if let Some(room) = entry.room.as_deref() {
            self.detach(room, id);
        }
        debug!(connection = %id, "connection deregistered");
        Some(entry.handle)
    }

    fn connection(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.get(&id).map(|entry| entry.handle.clone())
    }

    fn update_identity(&self, id: ConnectionId, identity: Identity) -> bool {
        match self.connections.get_mut(&id) {
            Some(mut entry) => {
                entry.handle.identity = identity;
                true
            }
            None => false,
        }
    }

    fn bind(&self, id: ConnectionId, room: &str) -> Result<(), BindError> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(BindError::UnknownConnection(id))?;
        match entry.room.as_deref() {
            Some(current) if current == room => return Ok(()),
            Some(current) => return Err(BindError::AlreadyBound(current.to_string())),
            None => {}
        }
        entry.room = Some(room.to_string());
        self.rooms.entry(room.to_string()).or_default().insert(id);
        Ok(())
    }

    fn unbind(&self, id: ConnectionId) -> Option<String> {
        let mut entry = self.connections.get_mut(&id)?;
        let room = entry.room.take()?;
        self.detach(&room, id);
        Some(room)
    }

    fn room_of(&self, id: ConnectionId) -> Option<String> {
        self.connections
            .get(&id)
            .and_then(|entry| entry.room.clone())
    }

    fn connections_in(&self, room: &str) -> Vec<ConnectionHandle> {
        let ids: Vec<ConnectionId> = match self.rooms.get(room) {
            Some(members) => members.iter().copied().collect(),
            None => return Vec::new(),
        };
        ids.into_iter()
            .filter_map(|id| self.connection(id))
            .collect()
    }
}
