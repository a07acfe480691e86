//! Progress reporting: the executor emits `(task_index, phase, text)` events
//! to a formatter abstraction instead of writing to the terminal directly.

use std::sync::Mutex;

/// The phase a progress event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The task is queued, waiting on its predecessors.
    Pending,
    /// The task has been handed to a worker and is running.
    Committed,
    /// The task reached a terminal state.
    Ended,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::Committed => "committed",
            Phase::Ended => "ended",
        }
    }
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Index of the task within its play's plan.
    pub task_index: usize,
    /// Which phase this event reports.
    pub phase: Phase,
    /// Free-form status text, e.g. a container name or failure message.
    pub text: String,
}

/// Destination for executor progress events.
pub trait ProgressSink: Send + Sync {
    /// Receive one event.
    fn emit(&self, event: Event);
}

/// Writes one line per event via `tracing`, the default sink.
#[derive(Debug, Default)]
pub struct LineProgressSink;

impl ProgressSink for LineProgressSink {
    fn emit(&self, event: Event) {
        tracing::info!(
            task_index = event.task_index,
            phase = event.phase.label(),
            "{}",
            event.text
        );
    }
}

/// Records every event in memory, for tests.
#[derive(Debug, Default)]
pub struct CapturingProgressSink {
    events: Mutex<Vec<Event>>,
}

impl CapturingProgressSink {
    /// Build an empty capturing sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every event recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("progress sink mutex poisoned").clone()
    }
}

impl ProgressSink for CapturingProgressSink {
    fn emit(&self, event: Event) {
        self.events.lock().expect("progress sink mutex poisoned").push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capturing_sink_records_in_order() {
        let sink = CapturingProgressSink::new();
        sink.emit(Event {
            task_index: 0,
            phase: Phase::Pending,
            text: "a1".to_string(),
        });
        sink.emit(Event {
            task_index: 0,
            phase: Phase::Ended,
            text: "a1".to_string(),
        });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].phase, Phase::Pending);
        assert_eq!(events[1].phase, Phase::Ended);
    }
}
