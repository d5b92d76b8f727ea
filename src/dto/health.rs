use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

/// Payload returned by the `/healthcheck` route.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Name of the installed storage backend, absent while degraded.
    pub storage: Option<String>,
}

impl HealthResponse {
    /// The storage backend answered.
    pub fn ok(backend: &str) -> Self {
        Self {
            status: "ok".to_string(),
            storage: Some(backend.to_string()),
        }
    }

    /// No storage backend is reachable.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
            storage: None,
        }
    }
}
