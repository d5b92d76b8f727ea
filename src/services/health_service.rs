use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether a storage backend is installed and answering.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store = match state.require_storage().await {
        Ok(store) => store,
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            return HealthResponse::degraded();
        }
    };

    match store.health_check().await {
        Ok(()) => HealthResponse::ok(store.backend_name()),
        Err(err) => {
            warn!(backend = store.backend_name(), error = %err, "storage health check failed");
            HealthResponse::degraded()
        }
    }
}
