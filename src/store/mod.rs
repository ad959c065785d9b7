//! In-memory stores backing every war room widget.
//!
//! Each store owns its collection behind a mutex and exposes only
//! operations that keep the data model's invariants. Every successful
//! mutation bumps a shared revision counter and is published on the
//! `EventBus`, so readers can either subscribe or poll `revision()`.

mod events;
mod health;
mod jobs;
mod notifications;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::EventBus;

pub use events::EventStore;
pub use health::HealthStore;
pub use jobs::JobStore;
pub use notifications::NotificationStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    #[error("job {0} already finished")]
    TerminalJob(String),
    #[error("progress of job {id} cannot go from {from} to {to} while running")]
    ProgressRegression { id: String, from: u8, to: u8 },
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },
}

/// History caps, oldest entries dropped first. Configuration rejects zero;
/// a store built directly with a zero cap keeps one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLimits {
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_max_notifications")]
    pub max_notifications: usize,
}

fn default_max_events() -> usize { 100 }
fn default_max_notifications() -> usize { 50 }

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            max_notifications: default_max_notifications(),
        }
    }
}

/// What every store needs to report a mutation.
#[derive(Clone)]
pub(crate) struct StoreContext {
    bus: Arc<EventBus>,
    revision: Arc<AtomicU64>,
}

impl StoreContext {
    pub(crate) fn record<T: Serialize>(&self, category: &str, event_type: &str, value: &T) {
        self.revision.fetch_add(1, Ordering::SeqCst);
        self.bus.emit_value(category, event_type, value);
    }
}

/// All four stores, owned together and shared as `Arc<Stores>`.
pub struct Stores {
    pub events: EventStore,
    pub jobs: JobStore,
    pub services: HealthStore,
    pub notifications: NotificationStore,
    bus: Arc<EventBus>,
    revision: Arc<AtomicU64>,
}

impl Stores {
    pub fn new(bus: Arc<EventBus>, limits: StoreLimits) -> Self {
        let revision = Arc::new(AtomicU64::new(0));
        let ctx = StoreContext {
            bus: bus.clone(),
            revision: revision.clone(),
        };
        Self {
            events: EventStore::new(ctx.clone(), limits.max_events),
            jobs: JobStore::new(ctx.clone()),
            services: HealthStore::new(ctx.clone()),
            notifications: NotificationStore::new(ctx, limits.max_notifications),
            bus,
            revision,
        }
    }

    /// The bus every mutation is published on.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Stores on a private bus, for callers that never subscribe.
    pub fn detached() -> Self {
        Self::new(Arc::new(EventBus::new()), StoreLimits::default())
    }

    /// Number of successful mutations across all stores since creation.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}
