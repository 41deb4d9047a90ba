//! Start/end timing markers around traced entity resolutions.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::info;

/// Receives trace markers. Labels look like `⧖ model:x(3)`.
pub trait TraceSink: Send + Sync {
    fn start(&self, label: &str);
    fn end(&self, label: &str, elapsed: Duration);
}

/// Emits markers as `tracing` events under the `dp_engine::trace` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn start(&self, label: &str) {
        info!(target: "dp_engine::trace", label, "start");
    }

    fn end(&self, label: &str, elapsed: Duration) {
        info!(
            target: "dp_engine::trace",
            label,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "end"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEventKind {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub kind: TraceEventKind,
    pub label: String,
}

/// In-memory sink that keeps every marker, for inspection in tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.label).collect()
    }

    fn push(&self, kind: TraceEventKind, label: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TraceEvent {
                kind,
                label: label.to_string(),
            });
    }
}

impl TraceSink for RecordingSink {
    fn start(&self, label: &str) {
        self.push(TraceEventKind::Start, label);
    }

    fn end(&self, label: &str, _elapsed: Duration) {
        self.push(TraceEventKind::End, label);
    }
}

/// An open marker; closing it reports the elapsed time to the sink.
pub(crate) struct TraceSpan<'a> {
    sink: &'a dyn TraceSink,
    label: String,
    started: Instant,
}

impl<'a> TraceSpan<'a> {
    pub(crate) fn open(sink: &'a dyn TraceSink, entity_id: &str, seq: u64) -> Self {
        let label = format!("⧖ {entity_id}({seq})");
        sink.start(&label);
        Self {
            sink,
            label,
            started: Instant::now(),
        }
    }

    pub(crate) fn close(self) {
        self.sink.end(&self.label, self.started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_emit_start_and_end_with_the_same_label() {
        let sink = RecordingSink::new();
        let span = TraceSpan::open(&sink, "model:x", 4);
        span.close();
        assert_eq!(
            sink.events(),
            vec![
                TraceEvent {
                    kind: TraceEventKind::Start,
                    label: "⧖ model:x(4)".into()
                },
                TraceEvent {
                    kind: TraceEventKind::End,
                    label: "⧖ model:x(4)".into()
                },
            ]
        );
    }
}
