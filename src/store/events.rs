use std::collections::VecDeque;
use std::sync::Mutex;

use crate::bus::event_types::{CATEGORY_EVENT, EVENT_ADDED};
use crate::core::SystemEvent;

use super::StoreContext;

/// Activity feed history, newest first, bounded to `capacity` entries.
pub struct EventStore {
    ctx: StoreContext,
    capacity: usize,
    events: Mutex<VecDeque<SystemEvent>>,
}

impl EventStore {
    pub(crate) fn new(ctx: StoreContext, capacity: usize) -> Self {
        Self {
            ctx,
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn add_event(&self, event: SystemEvent) -> SystemEvent {
        {
            let mut events = self.events.lock().expect("event store mutex poisoned");
            events.push_front(event.clone());
            events.truncate(self.capacity);
        }
        self.ctx.record(CATEGORY_EVENT, EVENT_ADDED, &event);
        event
    }

    /// All events, newest first.
    pub fn list(&self) -> Vec<SystemEvent> {
        let events = self.events.lock().expect("event store mutex poisoned");
        events.iter().cloned().collect()
    }

    pub fn recent(&self, limit: usize) -> Vec<SystemEvent> {
        let events = self.events.lock().expect("event store mutex poisoned");
        events.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("event store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
