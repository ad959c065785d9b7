use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use super::event_types::should_flush_immediately;
use super::BusEvent;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_MAX_BATCH: usize = 50;

/// Destination for batches of bus events.
pub trait BatchSink: Send + Sync + 'static {
    fn emit_batch(&self, batch: &[BusEvent]) -> Result<(), String>;
}

/// Writes every event as one JSON object per line.
pub struct JsonLinesSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl BatchSink for JsonLinesSink {
    fn emit_batch(&self, batch: &[BusEvent]) -> Result<(), String> {
        let mut out = self.out.lock().expect("sink mutex poisoned");
        for event in batch {
            let line = serde_json::to_string(event).map_err(|e| e.to_string())?;
            writeln!(out, "{line}").map_err(|e| e.to_string())?;
        }
        out.flush().map_err(|e| e.to_string())
    }
}

pub struct EventBatcher;

impl EventBatcher {
    /// Spawn a background task that batches events and hands them to `sink`.
    ///
    /// - "Immediate" events (see `should_flush_immediately`) are flushed
    ///   instantly as a single-element batch, after whatever is buffered.
    /// - All other events are buffered and flushed every 100ms or when the
    ///   buffer reaches 50 events.
    ///
    /// The task exits once every bus sender is dropped.
    pub fn start(
        mut rx: broadcast::Receiver<BusEvent>,
        sink: Arc<dyn BatchSink>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut buffer: Vec<BusEvent> = Vec::with_capacity(DEFAULT_MAX_BATCH);
            let mut interval =
                time::interval_at(time::Instant::now() + DEFAULT_FLUSH_INTERVAL, DEFAULT_FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    result = rx.recv() => {
                        match result {
                            Ok(event) => {
                                if should_flush_immediately(&event) {
                                    // Flush buffer first so ordering is preserved
                                    if !buffer.is_empty() {
                                        flush(sink.as_ref(), &mut buffer);
                                    }
                                    if let Err(e) = sink.emit_batch(std::slice::from_ref(&event)) {
                                        tracing::warn!("failed to emit {} to sink: {e}", event.event_type);
                                    }
                                } else {
                                    buffer.push(event);
                                    if buffer.len() >= DEFAULT_MAX_BATCH {
                                        flush(sink.as_ref(), &mut buffer);
                                    }
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!("event batcher lagged, dropped {n} events");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                if !buffer.is_empty() {
                                    flush(sink.as_ref(), &mut buffer);
                                }
                                break;
                            }
                        }
                    }
                    _ = interval.tick() => {
                        if !buffer.is_empty() {
                            flush(sink.as_ref(), &mut buffer);
                        }
                    }
                }
            }
        })
    }
}

fn flush(sink: &dyn BatchSink, buffer: &mut Vec<BusEvent>) {
    if let Err(e) = sink.emit_batch(buffer) {
        tracing::warn!("failed to emit event batch to sink: {e}");
    }
    buffer.clear();
}
