//! Background expiry of rooms nobody has touched for a while.

use std::time::SystemTime;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::{
    services::room_service,
    state::{SharedState, room::TeardownReason},
};

/// Result of a single sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Rooms torn down by this sweep.
    pub expired: Vec<String>,
    /// Rooms whose teardown failed; retried on the next sweep.
    pub failed: Vec<String>,
}

/// Sweep once storage is first available, then on every tick of the configured interval.
pub async fn run(state: SharedState) {
    let mut degraded = state.degraded_watcher();
    if degraded.wait_for(|value| !*value).await.is_err() {
        return;
    }

    let period = state.config().sweep_interval();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if state.is_degraded() {
            debug!("storage degraded; skipping inactivity sweep");
            continue;
        }
        let report = sweep(&state, SystemTime::now()).await;
        if !report.expired.is_empty() || !report.failed.is_empty() {
            info!(
                expired = report.expired.len(),
                failed = report.failed.len(),
                "inactivity sweep finished"
            );
        }
    }
}

/// Tear down every room idle for longer than the inactivity threshold at `now`.
///
/// A room refreshed between listing and deletion survives. One room failing
/// does not stop the others from being processed.
pub async fn sweep(state: &SharedState, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();
    let Some(cutoff) = now.checked_sub(state.config().inactivity_threshold()) else {
        return report;
    };

    let storage = match state.require_storage().await {
        Ok(storage) => storage,
        Err(err) => {
            warn!(error = %err, "inactivity sweep skipped");
            return report;
        }
    };

    let candidates = match storage.find_inactive(cutoff).await {
        Ok(codes) => codes,
        Err(err) => {
            warn!(error = %err, "failed to list inactive rooms");
            return report;
        }
    };

    for code in candidates {
        match room_service::teardown_room(state, &code, TeardownReason::Inactivity, Some(cutoff))
            .await
        {
            Ok(true) => {
                info!(room = %code, "room expired after inactivity");
                report.expired.push(code);
            }
            Ok(false) => debug!(room = %code, "room became active again; kept"),
            Err(err) => {
                warn!(room = %code, error = %err, "failed to expire inactive room");
                report.failed.push(code);
            }
        }
    }
    report
}
