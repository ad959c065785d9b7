//! War room backend library.
//!
//! Holds the live state behind the SOC war room dashboard and keeps it
//! moving:
//! - Store setup and seeding
//! - Live feed polling (mock simulator by default)
//! - Toast notifications
//! - Event system for pushing changes to whatever renders them
//!
//! # Architecture
//!
//! - `core`: Shared domain types (events, jobs, service health, notifications)
//! - `store`: In-memory stores and their mutation API
//! - `feed`: `LiveFeed` trait, mock simulator and the cancellable poller
//! - `toast`: Self-expiring transient messages
//! - `widgets`: Read-only selectors for the dashboard panels
//! - `bus`: Event bus and batching towards a sink
//! - `config`: Defaults, config file and environment overrides

pub mod bus;
pub mod config;
pub mod core;
pub mod feed;
pub mod store;
pub mod toast;
pub mod widgets;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use bus::{EventBatcher, EventBus, JsonLinesSink};
use config::{AppConfig, ConfigError};
use crate::core::NoticeKind;
use feed::{FeedPoller, MockFeed};
use store::{StoreError, Stores};
use toast::Toaster;

/// How long shutdown waits for the batcher to drain.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl serde::Serialize for AppError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ---------------------------------------------------------------------------
// Application entry point
// ---------------------------------------------------------------------------

pub fn init_tracing() {
    // stdout carries the event stream, so logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warroom=debug,info")),
        )
        .try_init();
}

/// Run the war room backend until Ctrl-C: seed the stores, poll the feed,
/// stream bus events to stdout as JSON lines, then log a final snapshot.
pub async fn run() -> Result<(), AppError> {
    init_tracing();

    let config = AppConfig::load()?;
    let bus = Arc::new(EventBus::new());
    let stores = Arc::new(Stores::new(bus.clone(), config.limits));
    let batcher = EventBatcher::start(bus.subscribe(), Arc::new(JsonLinesSink::stdout()));
    let toaster = Toaster::new(bus.clone(), config.toasts.clone());

    let mut feed = MockFeed::new(&config.feed);
    if config.feed.mock_data_enabled {
        feed.seed(&stores, Utc::now())?;
    }
    let mut poller = FeedPoller::start(&config.feed, Box::new(feed), stores.clone());
    if poller.is_running() {
        toaster.post(
            NoticeKind::Success,
            "Live feed connected",
            Some(format!("Polling every {} ms", config.feed.poll_interval_ms)),
        );
    } else {
        toaster.post(NoticeKind::Warning, "Live feed paused", None);
    }

    tracing::info!("war room started");
    tokio::signal::ctrl_c().await?;

    poller.stop().await;
    toaster.clear();

    let snapshot = widgets::war_room(&stores, None, widgets::PanelLimits::default());
    match serde_json::to_string(&snapshot) {
        Ok(json) => tracing::info!(snapshot = %json, "final war room snapshot"),
        Err(e) => tracing::warn!("failed to serialize final snapshot: {e}"),
    }

    // The batcher exits once the last bus handle is gone.
    drop(poller);
    drop(toaster);
    drop(stores);
    drop(bus);
    if tokio::time::timeout(SHUTDOWN_FLUSH_TIMEOUT, batcher).await.is_err() {
        tracing::warn!("event batcher did not drain before shutdown");
    }

    tracing::info!("war room stopped");
    Ok(())
}
