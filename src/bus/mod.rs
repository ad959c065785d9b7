//! Change notifications for everything that renders store state.
//!
//! Events flow from stores/toasts → EventBus → EventBatcher → BatchSink:
//! - `EventBus`: in-memory broadcast channel, one event per mutation
//! - `EventBatcher`: buffers events (100ms/50 events) before handing them to a sink
//! - `BatchSink`: whatever renders them (stdout JSON lines in the binary)

mod batcher;
mod event_bus;
pub mod event_types;

pub use batcher::{BatchSink, EventBatcher, JsonLinesSink};
pub use event_bus::{BusEvent, EventBus};
