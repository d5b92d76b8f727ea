//! Watch-together backend entrypoint wiring REST, WebSocket and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watch_together_back::{
    config::AppConfig,
    dao::room_store::memory::MemoryStore,
    routes,
    services::inactivity_reaper,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());

    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "mongo".into());
    match backend.as_str() {
        "memory" => {
            warn!("using volatile in-memory storage; rooms are lost on restart");
            app_state.install_storage(Arc::new(MemoryStore::new())).await;
        }
        other => {
            if other != "mongo" {
                warn!(backend = %other, "unknown STORAGE_BACKEND; falling back to mongo");
            }
            spawn_mongo_supervisor(app_state.clone())?;
        }
    }

    tokio::spawn(inactivity_reaper::run(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState) -> anyhow::Result<()> {
    use watch_together_back::{
        dao::{
            room_store::{
                Storage,
                mongodb::{MongoConfig, MongoStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let mongo_uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let mongo_db = env::var("MONGO_DB").ok();

    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = mongo_uri.clone();
        let db = mongo_db.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn Storage>)
        }
    }));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: SharedState) -> anyhow::Result<()> {
    anyhow::bail!("built without the `mongo-store` feature; set STORAGE_BACKEND=memory")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
