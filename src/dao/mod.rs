/// Persistence model definitions shared by every backend.
pub mod models;
/// Room store and message log abstractions with their backends.
pub mod room_store;
/// Backend-agnostic storage errors.
pub mod storage;
