//! Batch sink that keeps everything it is handed.

use std::sync::Mutex;

use warroom_lib::bus::{BatchSink, BusEvent};

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BusEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<BusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }
}

impl BatchSink for RecordingSink {
    fn emit_batch(&self, batch: &[BusEvent]) -> Result<(), String> {
        self.events.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }
}
