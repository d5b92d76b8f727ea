use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::room::{
        CreateRoomRequest, RoomDeletedResponse, RoomMembersResponse, RoomResponse,
        UsernameRequest,
    },
    error::AppError,
    services::admin_service,
    state::SharedState,
};

/// Routes handling room administration outside of realtime sessions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/{room_code}", get(get_room).delete(delete_room))
        .route("/api/rooms/{room_code}/join", put(join_room))
        .route("/api/rooms/{room_code}/users", get(list_members))
}

/// Create a room, generating its code when none is provided.
#[utoipa::path(
    post,
    path = "/api/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomResponse),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Room code already in use")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    let room = admin_service::create_room(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(room.into())))
}

/// Fetch a live room.
#[utoipa::path(
    get,
    path = "/api/rooms/{room_code}",
    tag = "rooms",
    params(("room_code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, description = "Room", body = RoomResponse),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(room_code): Path<String>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = admin_service::fetch_room(&state, &room_code).await?;
    Ok(Json(room.into()))
}

/// Add a member to an existing room.
#[utoipa::path(
    put,
    path = "/api/rooms/{room_code}/join",
    tag = "rooms",
    params(("room_code" = String, Path, description = "Room code, case-insensitive")),
    request_body = UsernameRequest,
    responses(
        (status = 200, description = "Updated room", body = RoomResponse),
        (status = 404, description = "Room not found")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(room_code): Path<String>,
    Valid(Json(payload)): Valid<Json<UsernameRequest>>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = admin_service::join_room(&state, &room_code, &payload.username).await?;
    Ok(Json(room.into()))
}

/// List the members registered in a room.
#[utoipa::path(
    get,
    path = "/api/rooms/{room_code}/users",
    tag = "rooms",
    params(("room_code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, description = "Room members", body = RoomMembersResponse),
        (status = 404, description = "Room not found")
    )
)]
pub async fn list_members(
    State(state): State<SharedState>,
    Path(room_code): Path<String>,
) -> Result<Json<RoomMembersResponse>, AppError> {
    let users = admin_service::list_members(&state, &room_code).await?;
    Ok(Json(RoomMembersResponse { users }))
}

/// Delete a room; only its host may do so. Connected members are disconnected.
#[utoipa::path(
    delete,
    path = "/api/rooms/{room_code}",
    tag = "rooms",
    params(("room_code" = String, Path, description = "Room code, case-insensitive")),
    request_body = UsernameRequest,
    responses(
        (status = 200, description = "Room deleted", body = RoomDeletedResponse),
        (status = 403, description = "Requester is not the host"),
        (status = 404, description = "Room not found")
    )
)]
pub async fn delete_room(
    State(state): State<SharedState>,
    Path(room_code): Path<String>,
    Valid(Json(payload)): Valid<Json<UsernameRequest>>,
) -> Result<Json<RoomDeletedResponse>, AppError> {
    let room_code = admin_service::delete_room(&state, &room_code, &payload.username).await?;
    Ok(Json(RoomDeletedResponse {
        message: "Room deleted successfully".into(),
        room_code,
    }))
}
