//! Application-level configuration loading: chat history window and room expiry timings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "WATCH_TOGETHER_CONFIG_PATH";

const DEFAULT_HISTORY_LIMIT: usize = 100;
const DEFAULT_INACTIVITY_THRESHOLD_SECS: u64 = 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30 * 60;
const DEFAULT_LEAVE_GRACE_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    history_limit: usize,
    inactivity_threshold: Duration,
    sweep_interval: Duration,
    leave_grace: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        history_limit = app_config.history_limit,
                        inactivity_threshold_secs = app_config.inactivity_threshold.as_secs(),
                        sweep_interval_secs = app_config.sweep_interval.as_secs(),
                        "loaded room settings from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent fields keep their default value.
    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Number of chat messages replayed to a joining connection.
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Idle time after which a room is expired by the reaper.
    pub fn inactivity_threshold(&self) -> Duration {
        self.inactivity_threshold
    }

    /// Period between two reaper sweeps.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Settle delay before recomputing membership on leave.
    pub fn leave_grace(&self) -> Duration {
        self.leave_grace
    }

    /// Override the number of messages replayed on join.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Override the idle time after which a room expires.
    pub fn with_inactivity_threshold(mut self, threshold: Duration) -> Self {
        self.inactivity_threshold = threshold;
        self
    }

    /// Override the reaper period.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Override the leave settle delay.
    pub fn with_leave_grace(mut self, grace: Duration) -> Self {
        self.leave_grace = grace;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    history_limit: usize,
    inactivity_threshold_secs: u64,
    sweep_interval_secs: u64,
    leave_grace_ms: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            inactivity_threshold_secs: DEFAULT_INACTIVITY_THRESHOLD_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            leave_grace_ms: DEFAULT_LEAVE_GRACE_MS,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            history_limit: value.history_limit,
            inactivity_threshold: Duration::from_secs(value.inactivity_threshold_secs),
            // A zero period would make `tokio::time::interval` panic.
            sweep_interval: Duration::from_secs(value.sweep_interval_secs.max(1)),
            leave_grace: Duration::from_millis(value.leave_grace_ms),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_room_lifecycle() {
        let config = AppConfig::default();
        assert_eq!(config.history_limit(), 100);
        assert_eq!(config.inactivity_threshold(), Duration::from_secs(3600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(1800));
        assert_eq!(config.leave_grace(), Duration::from_millis(50));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_json_str(r#"{"history_limit": 20, "leave_grace_ms": 0}"#)
            .unwrap();
        assert_eq!(config.history_limit(), 20);
        assert_eq!(config.leave_grace(), Duration::ZERO);
        assert_eq!(config.sweep_interval(), Duration::from_secs(1800));
    }

    #[test]
    fn zero_sweep_interval_is_clamped() {
        let config = AppConfig::from_json_str(r#"{"sweep_interval_secs": 0}"#).unwrap();
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(AppConfig::from_json_str("{ not json").is_err());
    }
}
