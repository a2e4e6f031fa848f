//! Event sinks for pipeline observability.
//!
//! The orchestrator takes a sink explicitly; there is no global sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

#[cfg(test)]
pub use sink::MockEventSink;
