//! Keeps a storage backend installed in the shared state, reconnecting when it drops.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{room_store::Storage, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect the storage backend and keep the shared state in degraded mode while it is unreachable.
///
/// `connect` is called again from scratch once in-place reconnects are exhausted.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn Storage>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                info!(
                    backend = store.backend_name(),
                    "storage connection established; leaving degraded mode"
                );
                state.install_storage(store.clone()).await;
                delay = INITIAL_DELAY;

                watch_health(&state, store.as_ref()).await;

                warn!(
                    backend = store.backend_name(),
                    "exhausted storage reconnect attempts; dropping backend"
                );
                state.clear_storage().await;
            }
            Err(err) => {
                warn!(backend = err.backend(), error = %err, "storage connection attempt failed");
            }
        }
        sleep(delay).await;
        delay = next_delay(delay);
    }
}

/// Poll the backend until it fails and cannot be brought back in place.
async fn watch_health(state: &SharedState, store: &dyn Storage) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.set_degraded(false);
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed; entering degraded mode");
                state.set_degraded(true);
                if !reconnect(store).await {
                    return;
                }
                state.set_degraded(false);
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(store: &dyn Storage) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                sleep(delay).await;
                delay = next_delay(delay);
            }
        }
    }
    false
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}
