//! Live data feed driving the stores.
//!
//! - `LiveFeed`: one tick of "fetch what changed and write it to the stores"
//! - `MockFeed`: randomized simulator standing in for a real backend
//! - `FeedPoller`: cancellable periodic task that ticks a feed
//!
//! A real backend integration implements `LiveFeed` and plugs into the same
//! poller; nothing that reads the stores needs to change.

mod mock;
mod poller;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::Stores;

pub use mock::{MockFeed, SERVICE_NAMES};
pub use poller::{FeedPoller, PollerHandle};

/// What a single tick changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub event_id: Option<String>,
    pub advanced_jobs: Vec<String>,
    pub completed_jobs: Vec<String>,
    pub notification_id: Option<String>,
    pub health_refreshed: bool,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.event_id.is_none()
            && self.advanced_jobs.is_empty()
            && self.completed_jobs.is_empty()
            && self.notification_id.is_none()
            && !self.health_refreshed
    }
}

/// Cancellation shared between a poller and the feed it drives.
///
/// Every store write a feed makes goes through [`FeedCancel::write`]. Once
/// [`FeedCancel::cancel`] has returned, no further write runs, even one
/// issued from a tick still executing on another worker.
#[derive(Debug, Default)]
pub struct FeedCancel {
    cancelled: AtomicBool,
    writes: Mutex<()>,
}

impl FeedCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until any write in progress has finished.
    pub fn cancel(&self) {
        let _writes = self.writes.lock().expect("feed write lock poisoned");
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run `write` unless cancelled; `None` means the write was skipped.
    /// `write` must not await or call back into this guard.
    pub fn write<T>(&self, write: impl FnOnce() -> T) -> Option<T> {
        let _writes = self.writes.lock().expect("feed write lock poisoned");
        if self.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        Some(write())
    }
}

#[async_trait]
pub trait LiveFeed: Send + 'static {
    fn name(&self) -> &str;

    /// Apply one round of updates to `stores`, routing every write through
    /// `cancel`. Never fails: anything the feed cannot apply is logged and
    /// skipped. Returns early once cancelled.
    async fn tick(&mut self, stores: &Stores, cancel: &FeedCancel, now: DateTime<Utc>) -> TickReport;
}
