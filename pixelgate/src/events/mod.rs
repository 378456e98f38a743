//! Event emission for pipeline observability.

mod sink;

pub use sink::{EventSink, LoggingEventSink, NoOpEventSink, RecordingEventSink};
