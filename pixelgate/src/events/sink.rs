//! Event sink trait and implementations.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Trait for sinks that receive pipeline lifecycle events.
///
/// The scheduler emits `stage.started`, `stage.passed`, `stage.failed` and
/// `stage.skipped` events as stages move through their lifecycle.
pub trait EventSink: Send + Sync {
    /// Emits an event without blocking.
    ///
    /// This method must never fail; sink errors are swallowed so that
    /// observability can never break execution.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {
        // Intentionally empty - discards all events
    }
}

/// An event sink that logs events through the tracing framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink {
    /// Emit at debug level instead of info.
    debug: bool,
}

impl LoggingEventSink {
    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self { debug: false }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self { debug: true }
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        if self.debug {
            debug!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        }
    }
}

/// An event sink that records events in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<(String, Option<serde_json::Value>)>>>,
}

impl RecordingEventSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.lock().clone()
    }

    /// Returns the event types recorded for the given stage name.
    #[must_use]
    pub fn events_for_stage(&self, stage: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(_, data)| {
                data.as_ref()
                    .and_then(|d| d.get("stage"))
                    .and_then(|s| s.as_str())
                    == Some(stage)
            })
            .map(|(event_type, _)| event_type.clone())
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.lock().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sink_discards() {
        let sink = NoOpEventSink;
        sink.try_emit("stage.started", None);
    }

    #[test]
    fn test_recording_sink_captures_events() {
        let sink = RecordingEventSink::new();
        sink.try_emit(
            "stage.started",
            Some(serde_json::json!({ "stage": "fmt" })),
        );
        sink.try_emit(
            "stage.passed",
            Some(serde_json::json!({ "stage": "fmt" })),
        );

        assert_eq!(sink.events().len(), 2);
        assert_eq!(
            sink.events_for_stage("fmt"),
            vec!["stage.started".to_string(), "stage.passed".to_string()]
        );
    }
}
