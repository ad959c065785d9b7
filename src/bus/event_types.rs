//! Event type and category constants and flush policy.
//!
//! Single source of truth for which events are "immediate" (flushed to the
//! sink without batching) vs batched.

use super::event_bus::BusEvent;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

pub const CATEGORY_EVENT: &str = "event";
pub const CATEGORY_JOB: &str = "job";
pub const CATEGORY_HEALTH: &str = "health";
pub const CATEGORY_NOTIFICATION: &str = "notification";
pub const CATEGORY_TOAST: &str = "toast";
pub const CATEGORY_FEED: &str = "feed";

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

pub const EVENT_ADDED: &str = "event.added";
pub const JOB_ADDED: &str = "job.added";
pub const JOB_UPDATED: &str = "job.updated";
pub const JOB_COMPLETED: &str = "job.completed";
pub const HEALTH_REFRESHED: &str = "health.refreshed";
pub const NOTIFICATION_ADDED: &str = "notification.added";
pub const NOTIFICATION_READ: &str = "notification.read";
pub const TOAST_POSTED: &str = "toast.posted";
pub const TOAST_LEAVING: &str = "toast.leaving";
pub const TOAST_REMOVED: &str = "toast.removed";
pub const FEED_STARTED: &str = "feed.started";
pub const FEED_STOPPED: &str = "feed.stopped";

// ---------------------------------------------------------------------------
// Flush policy
// ---------------------------------------------------------------------------

/// Returns true if this event should reach the sink immediately instead of
/// being buffered. Immediate events preserve ordering with the current
/// buffer before being sent.
pub fn should_flush_immediately(event: &BusEvent) -> bool {
    if event.category == CATEGORY_TOAST || event.category == CATEGORY_NOTIFICATION {
        return true;
    }
    if event.category == CATEGORY_FEED {
        return true;
    }
    event.event_type == JOB_COMPLETED
}
