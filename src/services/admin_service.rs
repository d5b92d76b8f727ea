//! Business logic powering the room administration REST routes.
//!
//! These calls never touch realtime connections except for deletion, which
//! reuses the coordinator teardown so connected members are notified.

use std::time::SystemTime;

use tracing::{debug, info};

use crate::{
    dao::models::{CreateOutcome, RoomEntity},
    dto::room::CreateRoomRequest,
    error::ServiceError,
    services::room_service,
    state::{SharedState, room::RoomCode},
};

/// Attempts at drawing a free code before giving up.
const GENERATED_CODE_ATTEMPTS: usize = 8;

/// Create a room explicitly, with a generated code when none is requested.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomEntity, ServiceError> {
    let host = request.host_name.trim().to_string();
    if host.is_empty() {
        return Err(ServiceError::InvalidInput("hostName is required".into()));
    }
    let mut members: Vec<String> = request
        .users
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect();
    if members.is_empty() {
        members.push(host.clone());
    }

    let storage = state.require_storage().await?;

    if let Some(raw) = request.room_code.as_deref() {
        let code = RoomCode::parse(raw)?;
        let room = RoomEntity::new(code.as_str(), host, members, SystemTime::now());
        return match storage.create_room(room).await? {
            CreateOutcome::Created(room) => {
                info!(room = %room.room_code, host = %room.host, "room created");
                Ok(room)
            }
            CreateOutcome::AlreadyExists => Err(ServiceError::RoomAlreadyExists(code.into_string())),
        };
    }

    let mut attempt = 0;
    loop {
        let code = RoomCode::generate();
        let room = RoomEntity::new(code.as_str(), host.clone(), members.clone(), SystemTime::now());
        match storage.create_room(room).await? {
            CreateOutcome::Created(room) => {
                info!(room = %room.room_code, host = %room.host, "room created with generated code");
                return Ok(room);
            }
            CreateOutcome::AlreadyExists => {
                debug!(room = %code, attempt, "generated room code already taken");
                attempt += 1;
                if attempt == GENERATED_CODE_ATTEMPTS {
                    return Err(ServiceError::RoomAlreadyExists(code.into_string()));
                }
            }
        }
    }
}

/// Fetch a live room.
pub async fn fetch_room(state: &SharedState, room_code: &str) -> Result<RoomEntity, ServiceError> {
    let code = RoomCode::parse(room_code)?;
    let storage = state.require_storage().await?;
    storage
        .find_room(code.as_str())
        .await?
        .ok_or_else(|| ServiceError::RoomNotFound(code.into_string()))
}

/// Add `username` to an existing room without opening a realtime session.
pub async fn join_room(
    state: &SharedState,
    room_code: &str,
    username: &str,
) -> Result<RoomEntity, ServiceError> {
    let code = RoomCode::parse(room_code)?;
    let username = username.trim();
    if username.is_empty() {
        return Err(ServiceError::InvalidInput("username is required".into()));
    }
    let storage = state.require_storage().await?;
    let room = storage
        .add_member(code.as_str(), username, SystemTime::now())
        .await?
        .ok_or_else(|| ServiceError::RoomNotFound(code.to_string()))?;
    info!(room = %code, user = %username, "member added through REST");
    Ok(room)
}

/// Member keys registered in a room.
pub async fn list_members(
    state: &SharedState,
    room_code: &str,
) -> Result<Vec<String>, ServiceError> {
    fetch_room(state, room_code).await.map(|room| room.members)
}

/// Host-initiated deletion, tearing down any live session of the room.
pub async fn delete_room(
    state: &SharedState,
    room_code: &str,
    username: &str,
) -> Result<String, ServiceError> {
    let code = RoomCode::parse(room_code)?;
    room_service::delete_room(state, username, code.as_str()).await?;
    info!(room = %code, host = %username.trim(), "room deleted by host");
    Ok(code.into_string())
}
