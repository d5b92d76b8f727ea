/// Playback actions and the transitions they apply.
pub mod playback;
/// Live connection registry.
pub mod presence;
/// Room codes, identities and teardown reasons.
pub mod room;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::room_store::Storage, error::ServiceError};

use self::presence::{LocalPresence, PresenceTracker};

/// Application state shared by every handler and background task.
pub type SharedState = Arc<AppState>;

/// Central application state storing live connections and the storage handle.
pub struct AppState {
    storage: RwLock<Option<Arc<dyn Storage>>>,
    presence: Arc<dyn PresenceTracker>,
    degraded: watch::Sender<bool>,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_presence(config, Arc::new(LocalPresence::new()))
    }

    /// Same as [`AppState::new`] with a custom presence tracker.
    pub fn with_presence(config: AppConfig, presence: Arc<dyn PresenceTracker>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            storage: RwLock::new(None),
            presence,
            degraded: degraded_tx,
            config: Arc::new(config),
        })
    }

    /// Obtain a handle to the current storage backend, if one is installed.
    pub async fn storage(&self) -> Option<Arc<dyn Storage>> {
        let guard = self.storage.read().await;
        guard.as_ref().cloned()
    }

    /// Current storage backend, or [`ServiceError::Degraded`] while the backend is unhealthy.
    pub async fn require_storage(&self) -> Result<Arc<dyn Storage>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.storage().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new storage backend and leave degraded mode.
    pub async fn install_storage(&self, storage: Arc<dyn Storage>) {
        {
            let mut guard = self.storage.write().await;
            *guard = Some(storage);
        }
        self.set_degraded(false);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_storage(&self) {
        {
            let mut guard = self.storage.write().await;
            guard.take();
        }
        self.set_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Registry of live connections.
    pub fn presence(&self) -> &dyn PresenceTracker {
        self.presence.as_ref()
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// Update the degraded flag, notifying watchers only when it changes.
    pub fn set_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
