//! Runtime configuration.
//!
//! Resolution order: built-in defaults, then the JSON file named by
//! `WARROOM_CONFIG`, then individual `WARROOM_*` environment variables
//! (a `.env` file in the working directory is loaded first).

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreLimits;

pub const CONFIG_PATH_ENV: &str = "WARROOM_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("{key} must be between 0 and 1, got {value}")]
    ProbabilityOutOfRange { key: &'static str, value: f64 },
    #[error("poll interval must be positive")]
    ZeroInterval,
    #[error("{key} must be at least 1")]
    ZeroLimit { key: &'static str },
}

/// Mock live-feed settings. The probabilities are tuning knobs, not invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_true")]
    pub polling_enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_true")]
    pub mock_data_enabled: bool,
    #[serde(default = "default_event_probability")]
    pub event_probability: f64,
    #[serde(default = "default_notification_probability")]
    pub notification_probability: f64,
    #[serde(default = "default_health_refresh_probability")]
    pub health_refresh_probability: f64,
    #[serde(default = "default_storage_degraded_probability")]
    pub storage_degraded_probability: f64,
    /// Fixed RNG seed; `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_true() -> bool { true }
fn default_poll_interval_ms() -> u64 { 5_000 }
fn default_event_probability() -> f64 { 0.3 }
fn default_notification_probability() -> f64 { 0.05 }
fn default_health_refresh_probability() -> f64 { 0.1 }
fn default_storage_degraded_probability() -> f64 { 0.1 }

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            polling_enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
            mock_data_enabled: true,
            event_probability: default_event_probability(),
            notification_probability: default_notification_probability(),
            health_refresh_probability: default_health_refresh_probability(),
            storage_degraded_probability: default_storage_degraded_probability(),
            seed: None,
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        let probabilities = [
            ("event_probability", self.event_probability),
            ("notification_probability", self.notification_probability),
            ("health_refresh_probability", self.health_refresh_probability),
            ("storage_degraded_probability", self.storage_degraded_probability),
        ];
        for (key, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { key, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToastConfig {
    #[serde(default = "default_toast_duration_ms")]
    pub default_duration_ms: u64,
    /// Time a toast stays in the `leaving` state before removal.
    #[serde(default = "default_fade_out_ms")]
    pub fade_out_ms: u64,
}

fn default_toast_duration_ms() -> u64 { 5_000 }
fn default_fade_out_ms() -> u64 { 300 }

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_toast_duration_ms(),
            fade_out_ms: default_fade_out_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub toasts: ToastConfig,
    #[serde(default)]
    pub limits: StoreLimits,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("ignoring unreadable .env file: {e}");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match non_empty(lookup(CONFIG_PATH_ENV)) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        let feed = &mut config.feed;
        override_with(&lookup, "WARROOM_POLLING_ENABLED", &mut feed.polling_enabled)?;
        override_with(&lookup, "WARROOM_POLL_INTERVAL_MS", &mut feed.poll_interval_ms)?;
        override_with(&lookup, "WARROOM_MOCK_DATA", &mut feed.mock_data_enabled)?;
        override_with(&lookup, "WARROOM_EVENT_PROBABILITY", &mut feed.event_probability)?;
        override_with(
            &lookup,
            "WARROOM_NOTIFICATION_PROBABILITY",
            &mut feed.notification_probability,
        )?;
        override_with(
            &lookup,
            "WARROOM_HEALTH_REFRESH_PROBABILITY",
            &mut feed.health_refresh_probability,
        )?;
        override_with(
            &lookup,
            "WARROOM_STORAGE_DEGRADED_PROBABILITY",
            &mut feed.storage_degraded_probability,
        )?;
        if let Some(raw) = non_empty(lookup("WARROOM_SEED")) {
            feed.seed = Some(parse_value("WARROOM_SEED", &raw)?);
        }

        override_with(
            &lookup,
            "WARROOM_TOAST_DURATION_MS",
            &mut config.toasts.default_duration_ms,
        )?;
        override_with(&lookup, "WARROOM_TOAST_FADE_MS", &mut config.toasts.fade_out_ms)?;
        override_with(&lookup, "WARROOM_MAX_EVENTS", &mut config.limits.max_events)?;
        override_with(
            &lookup,
            "WARROOM_MAX_NOTIFICATIONS",
            &mut config.limits.max_notifications,
        )?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.feed.validate()?;
        if self.limits.max_events == 0 {
            return Err(ConfigError::ZeroLimit { key: "max_events" });
        }
        if self.limits.max_notifications == 0 {
            return Err(ConfigError::ZeroLimit {
                key: "max_notifications",
            });
        }
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn override_with<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = non_empty(lookup(key)) {
        *target = parse_value(key, &raw)?;
    }
    Ok(())
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
