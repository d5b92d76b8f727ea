//! Library crate for watch-together-back, exposing modules for binaries and integration tests.

/// Runtime configuration loaded from `config/app.json`.
pub mod config;
/// Storage traits, persisted models and backends.
pub mod dao;
/// Wire types for the REST API and the realtime channel.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum route trees.
pub mod routes;
/// Room coordination and supporting services.
pub mod services;
/// Shared application state and live connection tracking.
pub mod state;
