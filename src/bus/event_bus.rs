use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

const BUS_CAPACITY: usize = 1024;

/// One state change as seen by subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: String,
    /// Position on the bus. Receivers see strictly increasing values.
    pub seq: u64,
    pub category: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl BusEvent {
    fn stamped(seq: u64, category: String, event_type: String, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            seq,
            category,
            event_type,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Broadcast fan-out of store and toast changes.
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
    /// Next sequence number. Held across the send so concurrent publishers
    /// cannot deliver out of order.
    next_seq: Mutex<u64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            next_seq: Mutex::new(0),
        }
    }

    /// Stamp and broadcast a change. Returns the event even when nobody is
    /// listening.
    pub fn emit(
        &self,
        category: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> BusEvent {
        let mut next_seq = self.next_seq.lock().expect("event bus mutex poisoned");
        let event = BusEvent::stamped(*next_seq, category.into(), event_type.into(), payload);
        *next_seq += 1;
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!(event_type = %event.event_type, "no bus subscribers");
        }
        event
    }

    /// Serialize `value` as the payload; a value that fails to serialize is sent as null.
    pub fn emit_value<T: Serialize>(
        &self,
        category: &str,
        event_type: &str,
        value: &T,
    ) -> BusEvent {
        let payload = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::warn!("failed to serialize {event_type} payload: {e}");
            serde_json::Value::Null
        });
        self.emit(category, event_type, payload)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
