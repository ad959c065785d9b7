//! Shared helpers for war room integration tests.

pub mod recording_sink;

pub use recording_sink::RecordingSink;

use warroom_lib::config::FeedConfig;

/// Fast, deterministic feed: 100ms ticks, every probabilistic branch taken.
pub fn eager_feed_config(seed: u64) -> FeedConfig {
    FeedConfig {
        poll_interval_ms: 100,
        event_probability: 1.0,
        notification_probability: 1.0,
        health_refresh_probability: 1.0,
        seed: Some(seed),
        ..FeedConfig::default()
    }
}
