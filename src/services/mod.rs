/// Room administration behind the REST routes.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Periodic expiry of idle rooms.
pub mod inactivity_reaper;
/// Realtime event fan-out to room connections.
pub mod room_events;
/// Join, leave, playback, chat and teardown coordination.
pub mod room_service;
/// Storage connection lifecycle and degraded-mode tracking.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
