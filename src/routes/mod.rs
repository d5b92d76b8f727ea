use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI JSON.
pub mod docs;
/// Health endpoint.
pub mod health;
/// Room administration endpoints.
pub mod rooms;
/// Realtime WebSocket endpoint.
pub mod websocket;

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(rooms::router())
        .merge(websocket::router())
        .merge(docs::router());

    api_router.with_state(state)
}
