//! Progress reporting across the worker boundary.
//!
//! Delivery is fire-and-forget: a full or closed caller channel drops the
//! event and never fails the task. Within one task the reported percentage
//! is clamped to `0..=100` and never moves backwards.

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::protocol::TaskId;

/// One progress update for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: TaskId,
    /// Fractional completion, 0.0..=100.0.
    pub percent: f64,
    /// Short human-readable label, e.g. `"riasec: social"`.
    pub stage: String,
}

pub type ProgressSender = mpsc::Sender<ProgressEvent>;
pub type ProgressReceiver = mpsc::Receiver<ProgressEvent>;

/// Bounded caller-side progress channel.
pub fn progress_channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Push an event without waiting. Returns whether it was accepted.
pub fn deliver(sender: &ProgressSender, event: ProgressEvent) -> bool {
    match sender.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            trace!(task = %event.task_id, percent = event.percent, "progress channel full, dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Destination for progress emitted inside an execution context.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, percent: f64, stage: &str);
}

/// Sink writing straight into a caller's progress channel.
pub struct ChannelSink {
    task_id: TaskId,
    sender: ProgressSender,
}

impl ChannelSink {
    pub fn new(task_id: TaskId, sender: ProgressSender) -> Self {
        Self { task_id, sender }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, percent: f64, stage: &str) {
        deliver(
            &self.sender,
            ProgressEvent {
                task_id: self.task_id,
                percent,
                stage: stage.to_string(),
            },
        );
    }
}

/// Per-task reporter handed to a handler. Works without a sink (no-op).
pub struct ProgressReporter<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last: Cell<f64>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self {
            sink,
            last: Cell::new(0.0),
        }
    }

    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    /// Highest percentage reported so far.
    pub fn last(&self) -> f64 {
        self.last.get()
    }

    pub fn report(&self, percent: f64, stage: &str) {
        if percent.is_nan() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0).max(self.last.get());
        self.last.set(percent);
        if let Some(sink) = self.sink {
            sink.emit(percent, stage);
        }
    }

    /// A view mapping local 0..=100 progress onto `start..=end` of this reporter.
    pub fn band(&self, start: f64, end: f64) -> ProgressBand<'_, 'a> {
        ProgressBand {
            reporter: self,
            start,
            end,
        }
    }
}

pub struct ProgressBand<'r, 'a> {
    reporter: &'r ProgressReporter<'a>,
    start: f64,
    end: f64,
}

impl ProgressBand<'_, '_> {
    pub fn report(&self, local_percent: f64, stage: &str) {
        let local = local_percent.clamp(0.0, 100.0);
        self.reporter
            .report(self.start + (self.end - self.start) * local / 100.0, stage);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(f64, String)>>);

    impl ProgressSink for Recorder {
        fn emit(&self, percent: f64, stage: &str) {
            self.0.lock().unwrap().push((percent, stage.to_string()));
        }
    }

    #[test]
    fn reporter_is_monotonic_and_clamped() {
        let recorder = Recorder::default();
        let reporter = ProgressReporter::new(Some(&recorder));
        reporter.report(40.0, "a");
        reporter.report(10.0, "b");
        reporter.report(250.0, "c");
        reporter.report(f64::NAN, "d");

        let events = recorder.0.lock().unwrap();
        let pcts: Vec<f64> = events.iter().map(|(p, _)| *p).collect();
        assert_eq!(pcts, vec![40.0, 40.0, 100.0]);
        assert_eq!(events[1].1, "b");
    }

    #[test]
    fn silent_reporter_still_tracks() {
        let reporter = ProgressReporter::silent();
        assert!(!reporter.is_attached());
        reporter.report(55.0, "x");
        assert_eq!(reporter.last(), 55.0);
    }

    #[test]
    fn band_maps_local_progress() {
        let recorder = Recorder::default();
        let reporter = ProgressReporter::new(Some(&recorder));
        let band = reporter.band(25.0, 50.0);
        band.report(0.0, "start");
        band.report(50.0, "half");
        band.report(100.0, "done");

        let pcts: Vec<f64> = recorder.0.lock().unwrap().iter().map(|(p, _)| *p).collect();
        assert_eq!(pcts, vec![25.0, 37.5, 50.0]);
    }

    #[tokio::test]
    async fn closed_channel_never_fails() {
        let (tx, rx) = progress_channel(4);
        drop(rx);
        let sink = ChannelSink::new(TaskId::new(), tx);
        sink.emit(10.0, "ignored");
    }

    #[tokio::test]
    async fn full_channel_drops_events() {
        let (tx, mut rx) = progress_channel(1);
        let id = TaskId::new();
        let event = |p| ProgressEvent { task_id: id, percent: p, stage: String::new() };
        assert!(deliver(&tx, event(1.0)));
        assert!(!deliver(&tx, event(2.0)));
        assert_eq!(rx.recv().await.unwrap().percent, 1.0);
    }
}
