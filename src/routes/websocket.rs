use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{services::websocket_service, state::SharedState, state::room::Identity};

/// Identity the client connects with.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ConnectQuery {
    /// Persistent user identifier; absent for anonymous sessions.
    pub user_id: Option<String>,
    /// Display name; derived from the user id when absent.
    pub username: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "realtime",
    params(ConnectQuery),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a room WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let identity = Identity::new(query.user_id, query.username);
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, identity))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
