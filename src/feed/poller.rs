use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::bus::event_types::{CATEGORY_FEED, FEED_STARTED, FEED_STOPPED};
use crate::config::FeedConfig;
use crate::store::Stores;

use super::{FeedCancel, LiveFeed};

struct PollerState {
    cancel: FeedCancel,
    ticks: AtomicU64,
    /// Held for the duration of every tick; `stop` takes it to wait out an
    /// in-flight tick.
    gate: Mutex<()>,
}

pub struct FeedPoller;

impl FeedPoller {
    /// Spawn the periodic task ticking `feed` against `stores`.
    ///
    /// The first tick fires one interval after start. Ticks never overlap;
    /// if one overruns, the missed ticks are skipped rather than bunched.
    /// When polling or mock data is disabled nothing is spawned and the
    /// returned handle is idle.
    pub fn start(config: &FeedConfig, feed: Box<dyn LiveFeed>, stores: Arc<Stores>) -> PollerHandle {
        let state = Arc::new(PollerState {
            cancel: FeedCancel::new(),
            ticks: AtomicU64::new(0),
            gate: Mutex::new(()),
        });

        if !config.polling_enabled || !config.mock_data_enabled {
            tracing::info!(
                polling = config.polling_enabled,
                mock_data = config.mock_data_enabled,
                "live feed disabled"
            );
            state.cancel.cancel();
            return PollerHandle {
                state,
                stores,
                task: None,
            };
        }

        let period = config.poll_interval();
        tracing::info!(feed = feed.name(), interval_ms = config.poll_interval_ms, "live feed started");
        stores.bus().emit(
            CATEGORY_FEED,
            FEED_STARTED,
            serde_json::json!({ "feed": feed.name(), "interval_ms": config.poll_interval_ms }),
        );

        let task = tokio::spawn(run_loop(feed, stores.clone(), state.clone(), period));
        PollerHandle {
            state,
            stores,
            task: Some(task),
        }
    }
}

async fn run_loop(
    mut feed: Box<dyn LiveFeed>,
    stores: Arc<Stores>,
    state: Arc<PollerState>,
    period: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let _gate = state.gate.lock().await;
        if state.cancel.is_cancelled() {
            break;
        }
        let report = feed.tick(&stores, &state.cancel, Utc::now()).await;
        let tick = state.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            tick,
            event = report.event_id.is_some(),
            advanced = report.advanced_jobs.len(),
            completed = report.completed_jobs.len(),
            notification = report.notification_id.is_some(),
            health = report.health_refreshed,
            "feed tick"
        );
    }
}

/// Owner of a running poller. Dropping it cancels the loop: once `drop`
/// returns no further store write happens, though a tick in progress may
/// still be winding down.
pub struct PollerHandle {
    state: Arc<PollerState>,
    stores: Arc<Stores>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop ticking. Once this returns no tick is running and none will
    /// touch the stores again; a tick in progress bails at its next write.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.state.cancel.cancel();
        drop(self.state.gate.lock().await);
        task.abort();

        let ticks = self.ticks();
        tracing::info!(ticks, "live feed stopped");
        self.stores
            .bus()
            .emit(CATEGORY_FEED, FEED_STOPPED, serde_json::json!({ "ticks": ticks }));
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
            && !self.state.cancel.is_cancelled()
    }

    /// Completed ticks so far.
    pub fn ticks(&self) -> u64 {
        self.state.ticks.load(Ordering::SeqCst)
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        // Cannot await the gate here; cancelling the write guard is enough
        // to keep the stores untouched from now on.
        self.state.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
