use axum::{Json, Router, extract::State, http::StatusCode, routing::get};

use crate::{dto::health::HealthResponse, services::health_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses(
        (status = 200, description = "Storage reachable", body = HealthResponse),
        (status = 503, description = "Running in degraded mode", body = HealthResponse)
    )
)]
/// Report whether the backend can currently serve rooms.
pub async fn healthcheck(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let status = health_service::health_status(&state).await;
    let code = if status.storage.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// Configure the health routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/healthcheck", get(healthcheck))
}
