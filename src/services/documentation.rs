use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the watch-together backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::list_members,
        crate::routes::rooms::delete_room,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::UsernameRequest,
            crate::dto::room::RoomResponse,
            crate::dto::room::RoomMembersResponse,
            crate::dto::room::RoomDeletedResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room administration"),
        (name = "realtime", description = "WebSocket room sessions"),
    )
)]
/// OpenAPI document covering every HTTP route.
pub struct ApiDoc;
